//! Error types for stack configuration and projection.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors that can occur while loading configuration or projecting artifacts.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Stack configuration not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Unsupported stack configuration format: {0} (expected .yaml, .yml or .toml)")]
    UnsupportedFormat(PathBuf),

    #[error("Invalid stack configuration: {0}")]
    InvalidConfig(String),

    #[error("Stack configuration already exists at path: {0}")]
    AlreadyExists(PathBuf),

    #[error("Path template for {kind} artifacts renders to an unsafe path: {path}")]
    InvalidPath { kind: String, path: String },

    #[error("Region '{region}' is emitted twice into artifact {path}")]
    DuplicateRegion { path: String, region: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}
