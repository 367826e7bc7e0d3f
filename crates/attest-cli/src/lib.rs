//! Public entrypoints for `attest-cli` to enable in-process testing.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// Exit code for successful runs
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for generic failures
pub const EXIT_FAILURE: i32 = 1;
/// Exit code for initialization failures (missing library or engine binary)
pub const EXIT_INIT_FAILURE: i32 = 2;

#[derive(Parser)]
#[command(name = "attest")]
#[command(about = "AI application compliance auditing")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Policy library root directory
    #[arg(short, long, default_value = "policies")]
    pub library: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate a contract against a policy selection
    Evaluate(commands::evaluate::EvaluateArgs),
    /// Inspect the policy library
    Policies {
        #[command(subcommand)]
        command: commands::policies::PolicyCommands,
    },
}

/// Runs a parsed CLI invocation
///
/// # Errors
///
/// Propagates command failures; the caller maps error kinds to exit codes
/// via [`exit_code_for`].
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Evaluate(args) => commands::evaluate::run(&cli.library, args).await,
        Commands::Policies { command } => commands::policies::run(&cli.library, command),
    }
}

/// Maps an error chain to the documented exit codes
///
/// Missing policy library and missing OPA binary are initialization
/// failures (`2`); everything else is a generic failure (`1`).
#[must_use]
pub fn exit_code_for(error: &anyhow::Error) -> i32 {
    fn library_init_failure(policy_error: &attest_core::policy::PolicyError) -> bool {
        matches!(
            policy_error,
            attest_core::policy::PolicyError::LibraryNotFound { .. }
                | attest_core::policy::PolicyError::LibraryMalformed { .. }
        )
    }

    for cause in error.chain() {
        if let Some(core_error) = cause.downcast_ref::<attest_core::Error>() {
            return match core_error {
                attest_core::Error::OpaNotFound | attest_core::Error::Config(_) => {
                    EXIT_INIT_FAILURE
                }
                attest_core::Error::Policy(policy_error) if library_init_failure(policy_error) => {
                    EXIT_INIT_FAILURE
                }
                _ => EXIT_FAILURE,
            };
        }
        if let Some(policy_error) = cause.downcast_ref::<attest_core::policy::PolicyError>() {
            return if library_init_failure(policy_error) {
                EXIT_INIT_FAILURE
            } else {
                EXIT_FAILURE
            };
        }
    }
    EXIT_FAILURE
}
