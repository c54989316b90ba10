//! Plan command - Show what a regeneration would change.

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use husl_core::{ArtifactTree, ChangeSet, ChangeStatus};

use super::{engine_for, load_stack, read_document, show_validation_errors, CliError, TargetArgs};

#[derive(Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Print the change set as JSON
    #[arg(long)]
    json: bool,

    /// Include line deltas for modified artifacts
    #[arg(long)]
    diff: bool,
}

pub async fn execute(args: PlanArgs) -> Result<()> {
    let target = &args.target;
    info!("Planning {:?} into {:?}", target.doc, target.out);

    let text = read_document(&target.doc)?;
    let config = load_stack(target.stack.as_deref())?;
    let tree = ArtifactTree::load(&target.out)
        .with_context(|| format!("Failed to read output directory {:?}", target.out))?;

    let changes = engine_for(target)?
        .plan(&text, &tree, &config, target.scope())
        .map_err(show_validation_errors)?;

    if args.json {
        println!("{}", changes.to_json()?);
    } else {
        print_plan(&changes, args.diff);
    }

    let conflicts = changes.count(ChangeStatus::WouldConflict);
    if conflicts > 0 {
        return Err(CliError::ConflictsPresent(conflicts).into());
    }
    Ok(())
}

fn print_plan(changes: &ChangeSet, diff: bool) {
    println!("📋 Plan ({} artifacts)", changes.entries.len());
    for entry in &changes.entries {
        let icon = match entry.status {
            ChangeStatus::Unchanged => "  ",
            ChangeStatus::WouldCreate => "➕",
            ChangeStatus::WouldModify => "✏️ ",
            ChangeStatus::WouldConflict => "❌",
        };
        println!("   {} {} ({})", icon, entry.path, entry.status);
        if let Some(previous) = &entry.renamed_from {
            println!("      renamed from {}", previous);
        }
        for conflict in &entry.conflicts {
            println!("      - {}", conflict);
        }
        if diff && (entry.status == ChangeStatus::WouldModify || entry.renamed_from.is_some()) {
            if let Some(delta) = &entry.delta {
                for line in delta.lines() {
                    println!("      {}", line);
                }
            }
        }
    }
    for path in &changes.stale {
        println!("   ⚠️  {} is no longer generated", path);
    }

    println!();
    println!(
        "{} to create, {} to modify, {} unchanged, {} in conflict",
        changes.count(ChangeStatus::WouldCreate),
        changes.count(ChangeStatus::WouldModify),
        changes.count(ChangeStatus::Unchanged),
        changes.count(ChangeStatus::WouldConflict)
    );
}
