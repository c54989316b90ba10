//! Validate command - Parse and validate a document.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use husl_core::RegenEngine;

use super::{read_document, CliError};

#[derive(Args)]
pub struct ValidateArgs {
    /// Specification document
    doc: PathBuf,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

pub async fn execute(args: ValidateArgs) -> Result<()> {
    info!("Validating {:?}", args.doc);

    let text = read_document(&args.doc)?;
    let report = RegenEngine::new().validate(&text)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("📋 Validating {}...", args.doc.display());
        for error in report.errors() {
            println!("   ❌ {}", error);
        }
        for warning in report.warnings() {
            println!("   ⚠️  {}", warning);
        }
        println!();
        if report.valid {
            println!("✅ Document is valid ({} warning(s))", report.warning_count());
        }
    }

    if !report.valid {
        return Err(CliError::ValidationFailed(report.error_count()).into());
    }
    Ok(())
}
