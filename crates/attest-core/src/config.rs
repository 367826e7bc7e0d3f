//! Configuration management for Attest Core
//!
//! TOML-based configuration with environment variable overrides
//! (`ATTEST_`-prefixed, `__`-separated for nesting).

use crate::error::{Error, Result};
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Attest configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Policy library configuration
    #[serde(default)]
    pub library: LibraryConfig,
    /// Decision engine configuration
    #[serde(default)]
    pub engine: EngineConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Policy library configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Root directory of the policy tree
    pub root: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            root: "policies".to_string(),
        }
    }
}

/// Decision engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Remote OPA server base URL; embedded binary mode when unset
    #[serde(default)]
    pub server_url: Option<String>,
    /// Execution mode: production, development, or debug
    #[serde(default = "default_execution_mode")]
    pub execution_mode: String,
    /// Maximum concurrent engine invocations; CPU count when unset
    #[serde(default)]
    pub worker_count: Option<usize>,
    /// Per-invocation deadline in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            execution_mode: default_execution_mode(),
            worker_count: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

fn default_execution_mode() -> String {
    "production".to_string()
}

const fn default_timeout_seconds() -> u64 {
    60
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: pretty, json, or compact
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Config {
    /// Creates a new configuration with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file with environment overrides
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when the file cannot be read or does not
    /// deserialize.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let builder = ConfigBuilder::builder()
            .add_source(File::with_name(path.as_ref().to_str().unwrap_or("attest")))
            .add_source(Environment::with_prefix("ATTEST").separator("__"));

        builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build configuration: {e}")))?
            .try_deserialize()
            .map_err(|e| Error::Config(format!("Failed to deserialize configuration: {e}")))
    }

    /// Loads configuration from environment variables only
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when the environment values do not
    /// deserialize.
    pub fn from_env() -> Result<Self> {
        ConfigBuilder::builder()
            .add_source(Environment::with_prefix("ATTEST").separator("__"))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build configuration: {e}")))?
            .try_deserialize()
            .map_err(|e| Error::Config(format!("Failed to deserialize configuration: {e}")))
    }

    /// Saves configuration to a TOML file
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when serialization or the write fails.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize configuration: {e}")))?;
        std::fs::write(path, toml_string)
            .map_err(|e| Error::Config(format!("Failed to write configuration file: {e}")))
    }

    /// Validates the configuration for correctness
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.library.root.is_empty() {
            return Err(Error::Config(
                "library.root cannot be empty".to_string(),
            ));
        }
        if self.engine.execution_mode.parse::<crate::engine::ExecutionMode>().is_err() {
            return Err(Error::Config(format!(
                "engine.execution_mode must be production, development, or debug \
                 (got '{}')",
                self.engine.execution_mode
            )));
        }
        if self.engine.timeout_seconds == 0 {
            return Err(Error::Config(
                "engine.timeout_seconds must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
