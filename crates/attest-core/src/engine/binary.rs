//! Embedded OPA binary driver
//!
//! Runs `opa eval` as a subprocess, passing each policy file in the
//! dependency closure via `-d`, the input document on stdin, and the
//! decision query positionally. Execution modes map to OPA flag sets; a
//! failed or empty production run is retried once in debug mode to capture
//! diagnostics before a structured error document is returned.

use super::{ExecutionMode, OPA_PATH_ENV};
use crate::error::{Error, Result};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

/// Recommendation attached to decisions synthesized from an `allow` probe
const ALLOW_PROBE_RECOMMENDATION: &str =
    "Update the policy to include a detailed compliance_report rule for better evaluation results";

/// Driver for a locally installed `opa` executable
#[derive(Debug, Clone)]
pub struct OpaBinary {
    opa_path: PathBuf,
}

impl OpaBinary {
    /// Locates the OPA binary
    ///
    /// Search order: the `OPA_PATH` environment variable, a fixed list of
    /// platform-appropriate install locations, then every directory on
    /// `PATH`.
    ///
    /// # Errors
    ///
    /// Returns `Error::OpaNotFound` with an install hint when no candidate
    /// exists.
    pub fn locate() -> Result<Self> {
        if let Ok(env_path) = std::env::var(OPA_PATH_ENV) {
            let path = PathBuf::from(&env_path);
            if path.is_file() {
                info!("Found OPA via {OPA_PATH_ENV}: {env_path}");
                return Ok(Self { opa_path: path });
            }
            warn!("{OPA_PATH_ENV} is set but {env_path} does not exist");
        }

        for candidate in Self::fixed_candidates() {
            if candidate.is_file() {
                info!("Found OPA at fixed path: {}", candidate.display());
                return Ok(Self { opa_path: candidate });
            }
        }

        if let Some(path_var) = std::env::var_os("PATH") {
            for dir in std::env::split_paths(&path_var) {
                for name in Self::binary_names() {
                    let candidate = dir.join(name);
                    if candidate.is_file() {
                        info!("Found OPA on PATH: {}", candidate.display());
                        return Ok(Self { opa_path: candidate });
                    }
                }
            }
        }

        error!("OPA executable not found on this system");
        Err(Error::OpaNotFound)
    }

    /// Creates a driver for a known binary path (test support)
    #[must_use]
    pub fn with_path<P: Into<PathBuf>>(opa_path: P) -> Self {
        Self {
            opa_path: opa_path.into(),
        }
    }

    /// Path of the located binary
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.opa_path
    }

    fn fixed_candidates() -> Vec<PathBuf> {
        if cfg!(windows) {
            vec![
                PathBuf::from("C:/opa/opa.exe"),
                PathBuf::from("C:/opa/opa_windows_amd64.exe"),
            ]
        } else {
            vec![
                PathBuf::from("/usr/local/bin/opa"),
                PathBuf::from("/usr/bin/opa"),
            ]
        }
    }

    fn binary_names() -> &'static [&'static str] {
        if cfg!(windows) {
            &["opa.exe", "opa_windows_amd64.exe"]
        } else {
            &["opa"]
        }
    }

    /// Evaluates a query over a set of policy files
    ///
    /// Always returns a structured document. A non-zero exit or empty
    /// output triggers a single automatic retry in debug mode; if the
    /// debug attempt fails too, its stderr is attached to the returned
    /// error document. An empty JSON result falls back to probing the
    /// policy's `allow` rule.
    pub async fn evaluate(
        &self,
        policy_files: &[PathBuf],
        input: &Value,
        query: &str,
        mode: ExecutionMode,
        deadline: Duration,
    ) -> Value {
        let input_json = match serde_json::to_string(input) {
            Ok(json) => json,
            Err(e) => {
                return error_document(
                    &format!("Failed to serialize input data: {e}"),
                    None,
                    None,
                    policy_files,
                );
            }
        };

        for path in policy_files {
            if !path.is_file() {
                return error_document(
                    &format!("Policy file not found: {}", path.display()),
                    None,
                    None,
                    policy_files,
                );
            }
        }

        let mut attempt_mode = mode;
        loop {
            let args = build_args(query, policy_files, attempt_mode);
            let command_line = self.command_line(&args);
            debug!("Running OPA command: {command_line}");

            let output = match self.run(&args, &input_json, deadline).await {
                Ok(output) => output,
                Err(message) => {
                    return error_document(&message, None, Some(&command_line), policy_files);
                }
            };
            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

            if !output.status.success() {
                error!(
                    "OPA command failed with status {:?}: {stderr}",
                    output.status.code()
                );
                if attempt_mode != ExecutionMode::Debug {
                    info!("Retrying OPA evaluation in debug mode for diagnostics");
                    attempt_mode = ExecutionMode::Debug;
                    continue;
                }
                return error_document(
                    &format!(
                        "OPA execution returned non-zero exit code: {}",
                        output.status.code().unwrap_or(-1)
                    ),
                    Some(&stderr),
                    Some(&command_line),
                    policy_files,
                );
            }

            if !stderr.is_empty() {
                warn!("OPA stderr output (non-fatal): {stderr}");
            }

            if stdout.trim().is_empty() {
                warn!("OPA returned empty output");
                if attempt_mode != ExecutionMode::Debug {
                    info!("Retrying in debug mode to diagnose empty output");
                    attempt_mode = ExecutionMode::Debug;
                    continue;
                }
                let policy_name = policy_stem(policy_files);
                return json!({
                    "policy_name": policy_name,
                    "result": false,
                    "error": "Empty result from OPA",
                    "details": "The policy evaluation returned no output. Check if the \
                                compliance_report rule exists in the policy.",
                    "stderr": stderr,
                });
            }

            if attempt_mode != ExecutionMode::Production {
                // Pretty-format output is returned raw with its diagnostics
                return json!({
                    "result": stdout,
                    "format": "pretty",
                    "coverage": true,
                    "metrics": attempt_mode == ExecutionMode::Debug,
                });
            }

            return match serde_json::from_str::<Value>(&stdout) {
                Ok(parsed) if is_empty_result(&parsed) => {
                    warn!("OPA returned an empty JSON result; probing allow rule");
                    self.probe_allow(query, policy_files, &input_json, deadline)
                        .await
                }
                Ok(parsed) => parsed,
                Err(e) => {
                    error!("Error parsing OPA output as JSON: {e}");
                    json!({
                        "error": format!("Failed to parse OPA output: {e}"),
                        "raw_output": stdout,
                    })
                }
            };
        }
    }

    /// Probes the policy's `allow` rule and synthesizes a minimal decision
    /// document wrapping its boolean value
    async fn probe_allow(
        &self,
        query: &str,
        policy_files: &[PathBuf],
        input_json: &str,
        deadline: Duration,
    ) -> Value {
        let allow_query = query
            .strip_suffix(".compliance_report")
            .map_or_else(|| "data.allow".to_string(), |prefix| format!("{prefix}.allow"));
        debug!("Trying alternative query for allow rule: {allow_query}");

        let args = build_args(&allow_query, policy_files, ExecutionMode::Production);
        let mut allow_value = false;
        let mut details = "Policy only has 'allow' rule but no 'compliance_report' rule".to_string();

        if let Ok(output) = self.run(&args, input_json, deadline).await {
            if output.status.success() {
                let stdout = String::from_utf8_lossy(&output.stdout);
                if let Ok(parsed) = serde_json::from_str::<Value>(&stdout) {
                    if let Some(value) = parsed["result"][0]["expressions"][0]["value"].as_bool() {
                        allow_value = value;
                        details =
                            format!("Policy evaluation succeeded with 'allow' rule: {allow_value}");
                    }
                }
            }
        }

        json!({
            "result": [{
                "expressions": [{
                    "value": {
                        "policy": policy_stem(policy_files),
                        "overall_result": allow_value,
                        "detailed_results": {
                            "compliance": {
                                "result": allow_value,
                                "details": details,
                            }
                        },
                        "recommendations": [ALLOW_PROBE_RECOMMENDATION],
                    }
                }]
            }]
        })
    }

    async fn run(
        &self,
        args: &[String],
        input_json: &str,
        deadline: Duration,
    ) -> std::result::Result<std::process::Output, String> {
        let mut child = Command::new(&self.opa_path)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("OPA execution failed: {e}"))?;

        if let Some(mut stdin) = child.stdin.take() {
            // The subprocess may exit before consuming stdin; that surfaces
            // through its exit status, not the write
            if let Err(e) = stdin.write_all(input_json.as_bytes()).await {
                debug!("Error writing OPA stdin: {e}");
            }
        }

        match tokio::time::timeout(deadline, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(format!("OPA execution failed: {e}")),
            Err(_) => {
                warn!("OPA evaluation timed out after {deadline:?}; subprocess killed");
                Err(format!(
                    "OPA evaluation timed out after {}s",
                    deadline.as_secs()
                ))
            }
        }
    }

    fn command_line(&self, args: &[String]) -> String {
        let mut parts = vec![self.opa_path.display().to_string()];
        parts.extend(args.iter().cloned());
        parts.join(" ")
    }
}

fn build_args(query: &str, policy_files: &[PathBuf], mode: ExecutionMode) -> Vec<String> {
    let mut args = vec!["eval".to_string(), query.to_string()];
    for file in policy_files {
        args.push("-d".to_string());
        args.push(file.display().to_string());
    }
    match mode {
        ExecutionMode::Production => {
            args.push("--format".to_string());
            args.push("json".to_string());
            args.push("--fail".to_string());
        }
        ExecutionMode::Development => {
            args.push("--explain".to_string());
            args.push("fails".to_string());
            args.push("--coverage".to_string());
            args.push("--format".to_string());
            args.push("pretty".to_string());
        }
        ExecutionMode::Debug => {
            args.push("--explain".to_string());
            args.push("full".to_string());
            args.push("--coverage".to_string());
            args.push("--metrics".to_string());
            args.push("--instrument".to_string());
            args.push("--format".to_string());
            args.push("pretty".to_string());
        }
    }
    args.push("--stdin-input".to_string());
    args
}

fn is_empty_result(parsed: &Value) -> bool {
    parsed.is_null() || parsed.as_object().is_some_and(serde_json::Map::is_empty)
}

fn policy_stem(policy_files: &[PathBuf]) -> String {
    policy_files
        .first()
        .and_then(|p| p.file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn error_document(
    error: &str,
    stderr: Option<&str>,
    command: Option<&str>,
    policy_files: &[PathBuf],
) -> Value {
    json!({
        "error": error,
        "stderr": stderr.unwrap_or(""),
        "command": command.unwrap_or(""),
        "policy_files": policy_files
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>(),
    })
}
