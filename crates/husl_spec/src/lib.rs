//! # husl_spec
//!
//! Specification documents for husl: the data model, the parser, semantic
//! validation, refactoring and the document writer.
//!
//! A specification document is structured markdown-like text split into
//! sections (Schema, State Machines, Rules, Operations, ...). It is the single
//! source of truth from which code is projected.
//!
//! ## Features
//!
//! - **Parsing**: section-oriented parser that reports every error in one pass
//! - **Validation**: referential, type and naming checks with stable issue codes
//! - **Refactoring**: renames, additions, removals and modifications applied
//!   from version history metadata
//! - **Scoping**: dependency closure for selective regeneration
//!
//! ## Example
//!
//! ```rust,no_run
//! use husl_spec::{SpecParser, SpecValidator};
//!
//! let doc = SpecParser::parse_file("./orders.husl.md").unwrap();
//! let report = SpecValidator::validate(&doc);
//! if !report.valid {
//!     for issue in report.errors() {
//!         eprintln!("Error: {}", issue);
//!     }
//! }
//! ```

pub mod error;
pub mod grammar;
pub mod literals;
pub mod models;
pub mod naming;
pub mod outline;
pub mod parser;
pub mod refactor;
pub mod scope;
pub mod validator;
pub mod writer;

pub use error::{
    DanglingReference, DanglingReferenceError, ParseError, ParseErrors, SpecError, SpecResult,
};
pub use models::*;
pub use parser::SpecParser;
pub use refactor::RefactorApplier;
pub use scope::ScopeSelection;
pub use validator::{Severity, SpecValidator, ValidationIssue, ValidationReport};
pub use writer::SpecWriter;
