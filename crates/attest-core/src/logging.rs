//! Logging and tracing initialization for Attest Core
//!
//! Structured logging through the `tracing` ecosystem with selectable
//! output formats (pretty, json, compact) and `RUST_LOG`-style filtering.

use crate::config::LoggingConfig;
use crate::error::{Error, Result};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initializes the tracing subscriber from a logging configuration
///
/// The `RUST_LOG` environment variable overrides the configured level.
///
/// # Errors
///
/// Returns `Error::Config` for an invalid level filter or when a global
/// subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| Error::Config(format!("Invalid log level '{}': {e}", config.level)))?;

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match config.format.as_str() {
        "json" => registry
            .with(fmt::layer().json().with_target(true))
            .try_init(),
        "compact" => registry.with(fmt::layer().compact()).try_init(),
        _ => registry.with(fmt::layer().pretty()).try_init(),
    };
    result.map_err(|e| Error::Config(format!("Failed to initialize tracing: {e}")))
}

/// Initializes tracing with the default configuration
///
/// # Errors
///
/// Same failure modes as [`init_tracing`].
pub fn init_default_tracing() -> Result<()> {
    init_tracing(&LoggingConfig::default())
}
