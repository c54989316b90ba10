//! Init command - Write the default stack configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use husl_templates::StackConfigLoader;

#[derive(Args)]
pub struct InitArgs {
    /// Where to write the configuration; `.toml` selects TOML
    #[arg(short, long, env = "HUSL_STACK", default_value = "husl.stack.yaml")]
    stack: PathBuf,

    /// Overwrite an existing configuration
    #[arg(short, long)]
    force: bool,
}

pub async fn execute(args: InitArgs) -> Result<()> {
    info!("Writing default stack configuration to {:?}", args.stack);

    StackConfigLoader::write_default(&args.stack, args.force).with_context(|| {
        format!(
            "Failed to write {:?}. Use --force to overwrite an existing file",
            args.stack
        )
    })?;

    println!("✅ Stack configuration written to {}", args.stack.display());
    println!();
    println!("Next steps:");
    println!("  husl validate spec.husl.md");
    println!(
        "  husl generate spec.husl.md --stack {} --out generated",
        args.stack.display()
    );
    Ok(())
}
