//! Refactor command - Apply refactoring metadata to a document.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use husl_core::{EngineError, RegenEngine};
use husl_spec::{RefactoringMetadata, SpecDocument, SpecWriter};

use super::{read_document, CliError};

#[derive(Args)]
pub struct RefactorArgs {
    /// Specification document
    doc: PathBuf,

    /// Refactoring metadata file (YAML or JSON)
    #[arg(short, long, conflicts_with = "target_version", required_unless_present = "target_version")]
    metadata: Option<PathBuf>,

    /// Apply the refactoring attached to this version history entry
    #[arg(long = "version", id = "target_version")]
    target_version: Option<String>,

    /// Write the rewritten document here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

pub async fn execute(args: RefactorArgs) -> Result<()> {
    info!("Refactoring {:?}", args.doc);

    let text = read_document(&args.doc)?;
    let engine = RegenEngine::new();

    let result = match (&args.metadata, &args.target_version) {
        (Some(path), _) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read metadata {:?}", path))?;
            let metadata = RefactoringMetadata::from_yaml(&raw)
                .map_err(|e| CliError::RefactorFailed(e.to_string()))?;
            engine.refactor(&text, &metadata)
        }
        (None, Some(version)) => engine.refactor_to_version(&text, version),
        (None, None) => anyhow::bail!("Either --metadata or --version is required"),
    };
    let doc = refactored(result)?;

    let rendered = SpecWriter::write(&doc)?;
    match &args.output {
        Some(path) => {
            fs::write(path, &rendered).with_context(|| format!("Failed to write {:?}", path))?;
            println!("✅ Refactored document written to {}", path.display());
            if let Some(metadata) = &args.metadata {
                println!(
                    "   Pass --renames {} to plan and generate so custom regions follow renamed artifacts",
                    metadata.display()
                );
            }
        }
        None => print!("{}", rendered),
    }
    Ok(())
}

/// Keep parse failures as they are, everything else is a refactor failure.
fn refactored(result: Result<SpecDocument, EngineError>) -> Result<SpecDocument> {
    match result {
        Ok(doc) => Ok(doc),
        Err(e) if e.is_parse_error() => Err(e.into()),
        Err(e) => Err(CliError::RefactorFailed(e.to_string()).into()),
    }
}
