//! CLI command definitions.
//!
//! This module defines the command structure for the husl CLI.
//! Each subcommand maps to one engine operation.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use tracing::info;

use husl_core::{EngineError, RegenEngine, RenameMap};
use husl_spec::RefactoringMetadata;
use husl_templates::{StackConfig, StackConfigLoader};

pub mod generate;
pub mod init;
pub mod plan;
pub mod refactor;
pub mod validate;

/// husl - spec compiler and regeneration engine
#[derive(Parser)]
#[command(name = "husl")]
#[command(version, about = "husl - spec compiler and regeneration engine")]
#[command(long_about = r#"
husl compiles a structured specification document into source artifacts for a
configured stack and regenerates them without losing hand-written code inside
custom regions.

COMMANDS:
  validate  → Parse and validate a document
  plan      → Show what a regeneration would change, without writing
  generate  → Regenerate artifacts, preserving custom regions
  refactor  → Apply refactoring metadata to a document
  init      → Write the default stack configuration

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Validation failure
  4 - Conflict present
  5 - Parse failure
  6 - Refactor failure
"#)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse and validate a specification document
    Validate(validate::ValidateArgs),

    /// Plan a regeneration without writing anything
    Plan(plan::PlanArgs),

    /// Regenerate artifacts into the output directory
    Generate(generate::GenerateArgs),

    /// Apply refactoring metadata to a document
    Refactor(refactor::RefactorArgs),

    /// Write the default stack configuration
    Init(init::InitArgs),
}

/// Failures that carry their own exit code.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Validation failed with {0} error(s)")]
    ValidationFailed(usize),

    #[error("{0} artifact(s) have unresolved conflicts")]
    ConflictsPresent(usize),

    #[error("Refactoring failed: {0}")]
    RefactorFailed(String),

    #[error("Generation cancelled")]
    Cancelled,
}

/// Arguments shared by `plan` and `generate`.
#[derive(Args)]
pub struct TargetArgs {
    /// Specification document
    pub doc: PathBuf,

    /// Stack configuration (YAML or TOML); the built-in default when omitted
    #[arg(short, long, env = "HUSL_STACK")]
    pub stack: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, env = "HUSL_OUT", default_value = "generated")]
    pub out: PathBuf,

    /// Restrict to these operations or entities (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,

    /// Refactoring metadata whose renames locate previously generated artifacts
    #[arg(long)]
    pub renames: Option<PathBuf>,
}

impl TargetArgs {
    pub fn scope(&self) -> Option<&[String]> {
        if self.only.is_empty() {
            None
        } else {
            Some(self.only.as_slice())
        }
    }
}

/// The engine for a run, carrying the renames of `--renames` when given.
pub fn engine_for(target: &TargetArgs) -> Result<RegenEngine> {
    let engine = RegenEngine::new();
    let Some(path) = &target.renames else {
        return Ok(engine);
    };
    info!("Loading renames from {:?}", path);
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read metadata {:?}", path))?;
    let metadata = RefactoringMetadata::from_yaml(&raw)
        .with_context(|| format!("Invalid refactoring metadata {:?}", path))?;
    Ok(engine.with_renames(RenameMap::from_metadata(&metadata)))
}

/// Read a specification document.
pub fn read_document(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read document {:?}", path))
}

/// Print every validation error behind a failed run before it is reported.
pub fn show_validation_errors(error: EngineError) -> EngineError {
    if let EngineError::Validation(report) = &error {
        for issue in report.errors() {
            println!("   ❌ {}", issue);
        }
    }
    error
}

/// Load the stack configuration, or the default one.
pub fn load_stack(path: Option<&Path>) -> Result<StackConfig> {
    match path {
        Some(path) => {
            info!("Loading stack configuration from {:?}", path);
            Ok(StackConfigLoader::load(path)?)
        }
        None => {
            info!("Using the default stack configuration");
            Ok(StackConfig::default())
        }
    }
}
