//! Error types for the regeneration engine.

use std::path::PathBuf;

use thiserror::Error;

use husl_spec::{SpecError, ValidationReport};
use husl_templates::TemplateError;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors from the artifact tree and the output lock.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Artifact path escapes the output directory: {0}")]
    OutsideTree(String),

    #[error("Output directory is locked by another run: {0}")]
    Locked(PathBuf),
}

impl CoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors that abort a whole engine run before any artifact is written.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{0}")]
    Spec(#[from] SpecError),

    #[error("Validation failed with {} error(s)", .0.error_count())]
    Validation(ValidationReport),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl EngineError {
    pub fn is_parse_error(&self) -> bool {
        matches!(self, EngineError::Spec(SpecError::Parse(_)))
    }
}
