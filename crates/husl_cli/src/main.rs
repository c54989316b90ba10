//! husl CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Validation failure
//! - 4: Conflict present (conflicting artifacts were not written)
//! - 5: Parse failure
//! - 6: Refactor failure

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, CliError, Commands};
use husl_core::EngineError;
use husl_spec::SpecError;
use husl_templates::TemplateError;

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const VALIDATION_FAILURE: u8 = 3;
    pub const CONFLICT: u8 = 4;
    pub const PARSE_FAILURE: u8 = 5;
    pub const REFACTOR_FAILURE: u8 = 6;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbosity flags when set.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(cli.verbose, cli.quiet)));
    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let result = match cli.command {
        Commands::Validate(args) => commands::validate::execute(args).await,
        Commands::Plan(args) => commands::plan::execute(args).await,
        Commands::Generate(args) => commands::generate::execute(args).await,
        Commands::Refactor(args) => commands::refactor::execute(args).await,
        Commands::Init(args) => commands::init::execute(args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Log directives used when RUST_LOG is not set.
fn default_directives(verbose: bool, quiet: bool) -> &'static str {
    if verbose {
        "warn,husl=debug"
    } else if quiet {
        "warn"
    } else {
        "warn,husl=info"
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(err) = cause.downcast_ref::<CliError>() {
            return match err {
                CliError::ValidationFailed(_) => ExitCodes::VALIDATION_FAILURE,
                CliError::ConflictsPresent(_) => ExitCodes::CONFLICT,
                CliError::RefactorFailed(_) => ExitCodes::REFACTOR_FAILURE,
                CliError::Cancelled => ExitCodes::GENERAL_ERROR,
            };
        }
        if let Some(err) = cause.downcast_ref::<EngineError>() {
            return match err {
                EngineError::Validation(_) => ExitCodes::VALIDATION_FAILURE,
                EngineError::Spec(spec) => categorize_spec_error(spec),
                EngineError::Template(TemplateError::ConfigNotFound(_))
                | EngineError::Template(TemplateError::UnsupportedFormat(_)) => ExitCodes::INVALID_ARGS,
                _ => ExitCodes::GENERAL_ERROR,
            };
        }
        if let Some(err) = cause.downcast_ref::<SpecError>() {
            return categorize_spec_error(err);
        }
        if let Some(err) = cause.downcast_ref::<TemplateError>() {
            return match err {
                TemplateError::ConfigNotFound(_) | TemplateError::UnsupportedFormat(_) => {
                    ExitCodes::INVALID_ARGS
                }
                _ => ExitCodes::GENERAL_ERROR,
            };
        }
    }
    ExitCodes::GENERAL_ERROR
}

fn categorize_spec_error(e: &SpecError) -> u8 {
    match e {
        SpecError::Parse(_) => ExitCodes::PARSE_FAILURE,
        SpecError::UnknownScopeElement(_) => ExitCodes::INVALID_ARGS,
        SpecError::DanglingReference(_)
        | SpecError::UnknownTarget { .. }
        | SpecError::RenameCollision { .. }
        | SpecError::InvalidMetadata(_)
        | SpecError::VersionNotFound(_) => ExitCodes::REFACTOR_FAILURE,
        _ => ExitCodes::GENERAL_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use husl_spec::SpecParser;

    #[test]
    fn test_default_log_directives() {
        assert_eq!(default_directives(true, false), "warn,husl=debug");
        assert_eq!(default_directives(false, true), "warn");
        assert_eq!(default_directives(false, false), "warn,husl=info");
        assert!(EnvFilter::try_new(default_directives(true, false)).is_ok());
    }

    #[test]
    fn test_exit_codes_follow_error_kind() {
        let parse = SpecParser::parse("# Schema\nEntity: Widget\n  id UUID\n").unwrap_err();
        let err = anyhow::Error::from(EngineError::Spec(parse)).context("Failed to plan");
        assert_eq!(categorize_error(&err), ExitCodes::PARSE_FAILURE);

        let err = anyhow::Error::from(CliError::ConflictsPresent(2));
        assert_eq!(categorize_error(&err), ExitCodes::CONFLICT);

        let err = anyhow::Error::from(SpecError::UnknownScopeElement("Nope".into()));
        assert_eq!(categorize_error(&err), ExitCodes::INVALID_ARGS);

        let err = anyhow::anyhow!("something else");
        assert_eq!(categorize_error(&err), ExitCodes::GENERAL_ERROR);
    }
}
