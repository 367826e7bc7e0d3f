//! Attest Command Line Interface
//!
//! CLI tool for auditing AI applications against compliance policy sets.

use attest_cli::{Cli, exit_code_for, run};
use attest_core::config::LoggingConfig;
use clap::Parser;
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let logging = LoggingConfig {
        level: if cli.verbose {
            "debug".to_string()
        } else {
            "info".to_string()
        },
        ..LoggingConfig::default()
    };
    if let Err(e) = attest_core::logging::init_tracing(&logging) {
        eprintln!("Failed to initialize logging: {e}");
    }

    if let Err(e) = run(cli).await {
        error!("{e:#}");
        std::process::exit(exit_code_for(&e));
    }
}
