//! Decision engine driver
//!
//! Invokes OPA for a policy (plus its dependency closure) and an input
//! document, returning a raw decision document. Two execution backends are
//! supported: an embedded `opa` binary driven over stdin, and a remote OPA
//! server reached over HTTP.
//!
//! Failures never propagate as errors from evaluation calls: the driver
//! always returns a structured document, with an `error` key when something
//! went wrong, so a single failing policy cannot abort a contract
//! evaluation.

mod binary;
mod input;
mod server;

pub use binary::OpaBinary;
pub use input::build_input;
pub use server::OpaServer;

use crate::error::Result;
use crate::policy::Policy;
use serde_json::Value;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Environment variable overriding the OPA binary location
pub const OPA_PATH_ENV: &str = "OPA_PATH";
/// Environment variable selecting remote server mode
pub const OPA_SERVER_URL_ENV: &str = "OPA_SERVER_URL";
/// Environment variable forcing debug mode globally
pub const OPA_DEBUG_ENV: &str = "OPA_DEBUG";

/// How much diagnostic information the engine is asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Machine-readable JSON output, fail on empty result
    #[default]
    Production,
    /// Pretty output with failure explanations and coverage
    Development,
    /// Pretty output with full explanation trees, coverage, metrics, and
    /// instrumentation
    Debug,
}

impl ExecutionMode {
    /// Applies the global `OPA_DEBUG` override
    #[must_use]
    pub fn effective(self) -> Self {
        if opa_debug_enabled() { Self::Debug } else { self }
    }
}

impl Display for ExecutionMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Production => write!(f, "production"),
            Self::Development => write!(f, "development"),
            Self::Debug => write!(f, "debug"),
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "development" => Ok(Self::Development),
            "debug" => Ok(Self::Debug),
            _ => Err(format!("Invalid execution mode: {s}")),
        }
    }
}

fn opa_debug_enabled() -> bool {
    std::env::var(OPA_DEBUG_ENV).is_ok_and(|value| {
        matches!(
            value.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

enum Backend {
    Binary(OpaBinary),
    Server(OpaServer),
}

/// Decision engine facade over the embedded-binary and remote-server modes
pub struct OpaEvaluator {
    backend: Backend,
}

impl OpaEvaluator {
    /// Creates an evaluator driving a local `opa` binary
    ///
    /// # Errors
    ///
    /// Returns `Error::OpaNotFound` when no binary can be located.
    pub fn embedded() -> Result<Self> {
        let binary = OpaBinary::locate()?;
        info!("OPA evaluator using embedded binary: {}", binary.path().display());
        Ok(Self {
            backend: Backend::Binary(binary),
        })
    }

    /// Creates an evaluator around an already-located binary (test support)
    #[must_use]
    pub fn with_binary(binary: OpaBinary) -> Self {
        Self {
            backend: Backend::Binary(binary),
        }
    }

    /// Creates an evaluator targeting a remote OPA server
    #[must_use]
    pub fn remote<S: Into<String>>(base_url: S) -> Self {
        let server = OpaServer::new(base_url);
        info!("OPA evaluator using remote server: {}", server.base_url());
        Self {
            backend: Backend::Server(server),
        }
    }

    /// Picks the backend from the environment: remote when
    /// `OPA_SERVER_URL` is set, embedded otherwise
    ///
    /// # Errors
    ///
    /// Returns `Error::OpaNotFound` in embedded mode when no binary exists.
    pub fn from_env() -> Result<Self> {
        match std::env::var(OPA_SERVER_URL_ENV) {
            Ok(url) if !url.is_empty() => Ok(Self::remote(url)),
            _ => Self::embedded(),
        }
    }

    /// True when the evaluator targets a remote server
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self.backend, Backend::Server(_))
    }

    /// Uploads policy sources to the remote server; a no-op in embedded mode
    ///
    /// # Errors
    ///
    /// Returns an error only on unrecoverable transport setup failures;
    /// individual upload rejections are logged and skipped.
    pub async fn upload_policies(&self, policies: &[&Policy]) -> Result<()> {
        match &self.backend {
            Backend::Binary(_) => Ok(()),
            Backend::Server(server) => server.upload_policies(policies).await,
        }
    }

    /// Evaluates one policy (with its dependency closure) against an input
    /// document
    ///
    /// Always returns a structured document; failures are reported through
    /// an `error` key rather than an `Err`.
    pub async fn evaluate_policy(
        &self,
        policy_files: &[PathBuf],
        input: &Value,
        query: &str,
        mode: ExecutionMode,
        deadline: Duration,
    ) -> Value {
        match &self.backend {
            Backend::Binary(binary) => {
                binary
                    .evaluate(policy_files, input, query, mode.effective(), deadline)
                    .await
            }
            Backend::Server(server) => server.evaluate(query, input, deadline).await,
        }
    }
}
