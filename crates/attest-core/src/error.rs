//! Error types for Attest Core

use thiserror::Error;

/// Attest Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Policy library error
    #[error("Policy error: {0}")]
    Policy(#[from] crate::policy::PolicyError),

    /// Contract validation error
    #[error("Contract error: {0}")]
    Contract(String),

    /// Evaluator error
    #[error("Evaluator error: {0}")]
    Evaluator(String),

    /// OPA binary could not be located
    #[error(
        "OPA executable not found. Install OPA from https://www.openpolicyagent.org/docs/latest/#1-download-opa, \
         place it on PATH or at /usr/local/bin/opa, or set the OPA_PATH environment variable"
    )]
    OpaNotFound,

    /// Decision engine error
    #[error("Engine error: {0}")]
    Engine(String),

    /// Report generation error
    #[error("Report error: {0}")]
    Report(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("Other error: {0}")]
    Other(String),
}

/// Attest Core result type
pub type Result<T> = std::result::Result<T, Error>;
