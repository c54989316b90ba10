//! Generate command - Regenerate artifacts into the output directory.

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use husl_core::{ArtifactOutcome, ArtifactTree, Cancellation, OutputLock, RunReport};

use super::{engine_for, load_stack, read_document, show_validation_errors, CliError, TargetArgs};

#[derive(Args)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
}

pub async fn execute(args: GenerateArgs) -> Result<()> {
    let GenerateArgs { target, json } = args;
    info!("Generating {:?} into {:?}", target.doc, target.out);

    let text = read_document(&target.doc)?;
    let config = load_stack(target.stack.as_deref())?;
    let engine = engine_for(&target)?;

    // Held until the run report is printed.
    let _lock = OutputLock::acquire(&target.out)
        .with_context(|| format!("Failed to lock output directory {:?}", target.out))?;
    let tree = ArtifactTree::load(&target.out)
        .with_context(|| format!("Failed to read output directory {:?}", target.out))?;

    let cancel = Cancellation::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current artifact");
            on_signal.cancel();
        }
    });

    let only = target.only.clone();
    let report = tokio::task::spawn_blocking(move || {
        let scope = (!only.is_empty()).then_some(only.as_slice());
        engine.generate(&text, &tree, &config, scope, &cancel)
    })
    .await
    .context("Generation task failed")?
    .map_err(show_validation_errors)?;

    if json {
        println!("{}", report.to_json()?);
    } else {
        print_report(&report);
    }

    if report.has_failures() {
        anyhow::bail!(
            "{} artifact(s) could not be written",
            report.count(ArtifactOutcome::Failed)
        );
    }
    if report.has_conflicts() {
        return Err(CliError::ConflictsPresent(report.count(ArtifactOutcome::SkippedConflict)).into());
    }
    if report.was_cancelled() {
        return Err(CliError::Cancelled.into());
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("🔨 Generated {} artifacts", report.artifacts.len());
    for artifact in &report.artifacts {
        let icon = match artifact.outcome {
            ArtifactOutcome::Written => "✅",
            ArtifactOutcome::Unchanged => "  ",
            ArtifactOutcome::SkippedConflict => "❌",
            ArtifactOutcome::Failed => "💥",
            ArtifactOutcome::Cancelled => "⏹️ ",
        };
        println!("   {} {} ({})", icon, artifact.path, artifact.outcome);
        if let Some(previous) = &artifact.renamed_from {
            println!("      renamed from {}", previous);
        }
        for conflict in &artifact.conflicts {
            println!("      - {}", conflict);
        }
        if let Some(error) = &artifact.error {
            println!("      - {}", error);
        }
    }
    for warning in &report.warnings {
        println!("   ⚠️  {}", warning);
    }
    for path in &report.stale {
        println!("   ⚠️  {} is no longer generated", path);
    }

    println!();
    println!(
        "{} written, {} unchanged, {} skipped, {} failed, {} cancelled",
        report.count(ArtifactOutcome::Written),
        report.count(ArtifactOutcome::Unchanged),
        report.count(ArtifactOutcome::SkippedConflict),
        report.count(ArtifactOutcome::Failed),
        report.count(ArtifactOutcome::Cancelled)
    );
}
