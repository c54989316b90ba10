//! Error types for parsing, validation and refactoring.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Result type alias for spec operations.
pub type SpecResult<T> = Result<T, SpecError>;

/// A malformed construct found while parsing a specification document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseError {
    /// 1-based line number.
    pub line: usize,
    /// 1-based column (in characters) where the problem starts.
    pub column: usize,
    /// Byte offset from the start of the document.
    pub offset: usize,
    /// The construct the parser was looking for.
    pub expected: String,
    /// The text found instead.
    pub found: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}, column {}: expected {}, found `{}`",
            self.line, self.column, self.expected, self.found
        )
    }
}

/// Every parse error collected over one pass of the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseErrors(pub Vec<ParseError>);

impl ParseErrors {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParseError> {
        self.0.iter()
    }
}

impl fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} parse error(s)", self.0.len())?;
        for error in &self.0 {
            write!(f, "\n  {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseErrors {}

/// A single element still pointing at a removed name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DanglingReference {
    /// The removed name, e.g. `Widget.legacy` or `OrderStatus.HELD`.
    pub removed: String,
    /// Location of the element that still references it.
    pub referrer: String,
}

/// A removal would leave references to names that no longer exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DanglingReferenceError {
    pub references: Vec<DanglingReference>,
}

impl fmt::Display for DanglingReferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} dangling reference(s)", self.references.len())?;
        for reference in &self.references {
            write!(f, "\n  {} still references {}", reference.referrer, reference.removed)?;
        }
        Ok(())
    }
}

impl std::error::Error for DanglingReferenceError {}

/// Errors that can occur during spec operations.
#[derive(Error, Debug)]
pub enum SpecError {
    #[error("Parse failed: {0}")]
    Parse(#[from] ParseErrors),

    #[error("Refactoring failed: {0}")]
    DanglingReference(#[from] DanglingReferenceError),

    #[error("Refactoring target not found: {kind} `{name}`")]
    UnknownTarget { kind: String, name: String },

    #[error("Rename collision: {kind} `{name}` already exists")]
    RenameCollision { kind: String, name: String },

    #[error("Invalid refactoring metadata: {0}")]
    InvalidMetadata(String),

    #[error("Version not found in history: {0}")]
    VersionNotFound(String),

    #[error("Scope element is neither an operation nor an entity: {0}")]
    UnknownScopeElement(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}
