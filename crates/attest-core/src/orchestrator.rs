//! Compliance orchestrator
//!
//! The externally visible entry point for contract-level evaluations. One
//! evaluation resolves a policy selector to concrete policy files, derives
//! the required metrics and parameter defaults, dispatches the covering
//! evaluators, shapes the engine input document, runs the decision engine
//! per policy (bounded concurrency, stable ordering), and extracts
//! structured policy results.

use crate::engine::{ExecutionMode, OpaEvaluator, build_input};
use crate::error::Result;
use crate::evaluator::dispatch_evaluators;
use crate::extraction::extract_all_policy_results;
use crate::models::{Contract, PolicyResult};
use crate::policy::{
    Policy, PolicyLibrary, query_for_policy, required_metrics, required_params,
    resolve_dependencies,
};
use futures::StreamExt;
use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Process-wide cache of opened libraries, keyed by root path
static LIBRARY_CACHE: Lazy<Mutex<HashMap<PathBuf, Arc<PolicyLibrary>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Opens a policy library, reusing a previously opened instance for the
/// same root
///
/// # Errors
///
/// Propagates [`crate::policy::PolicyError`] from the underlying open.
pub fn open_cached_library<P: Into<PathBuf>>(root: P) -> Result<Arc<PolicyLibrary>> {
    let root = root.into();
    let mut cache = LIBRARY_CACHE.lock().expect("library cache lock poisoned");
    if let Some(library) = cache.get(&root) {
        debug!("Reusing cached policy library for {}", root.display());
        return Ok(Arc::clone(library));
    }
    let library = Arc::new(PolicyLibrary::open(root.clone())?);
    cache.insert(root, Arc::clone(&library));
    Ok(library)
}

/// Options controlling one contract evaluation
#[derive(Debug, Clone)]
pub struct EvaluationOptions {
    /// Engine execution mode
    pub mode: ExecutionMode,
    /// Per-evaluator configuration overrides, keyed by evaluator name
    pub evaluator_config: Map<String, Value>,
    /// Caller parameters merged over the policies' declared defaults
    pub custom_params: Map<String, Value>,
    /// Maximum concurrent engine invocations
    pub worker_count: usize,
    /// Deadline applied to each engine invocation
    pub deadline: Duration,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            evaluator_config: Map::new(),
            custom_params: Map::new(),
            worker_count: std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(4),
            deadline: Duration::from_secs(60),
        }
    }
}

/// Combined result of one contract evaluation
#[derive(Debug, Clone)]
pub struct EvaluationOutcome {
    /// Contract identifier
    pub contract_id: Uuid,
    /// Application the contract describes
    pub application_name: String,
    /// Metric document produced by evaluator dispatch
    pub metric_document: Map<String, Value>,
    /// Merged parameter map handed to the engine
    pub parameters: Map<String, Value>,
    /// Raw engine decision documents keyed by policy stem
    pub raw_engine_results: Map<String, Value>,
    /// Extracted per-policy results, one entry per evaluated policy, in
    /// library enumeration order
    pub policy_results: Vec<PolicyResult>,
    /// Logical AND over policy results and the evaluators' overall
    /// indicator
    pub overall_passed: bool,
}

/// Coordinates the policy library, evaluator dispatch, and decision engine
pub struct ComplianceOrchestrator {
    library: Arc<PolicyLibrary>,
    engine: OpaEvaluator,
}

impl ComplianceOrchestrator {
    /// Creates an orchestrator over an opened library and engine driver
    #[must_use]
    pub fn new(library: Arc<PolicyLibrary>, engine: OpaEvaluator) -> Self {
        Self { library, engine }
    }

    /// Convenience constructor: cached library open plus an engine picked
    /// from the environment
    ///
    /// # Errors
    ///
    /// Fails when the library root is missing or, in embedded mode, when no
    /// OPA binary can be located. Both are initialization-time
    /// configuration errors.
    pub fn from_library_root<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let library = open_cached_library(root)?;
        let engine = OpaEvaluator::from_env()?;
        Ok(Self::new(library, engine))
    }

    /// The orchestrator's policy library
    #[must_use]
    pub fn library(&self) -> &PolicyLibrary {
        &self.library
    }

    /// Evaluates a contract against the policies matched by a loose
    /// category selector
    ///
    /// # Errors
    ///
    /// Only configuration-level failures return `Err`; per-policy engine
    /// failures are folded into the outcome as failed policy results.
    pub async fn evaluate_by_category(
        &self,
        contract: &Contract,
        selector: &str,
        options: &EvaluationOptions,
    ) -> Result<EvaluationOutcome> {
        info!(
            "Evaluating contract {} against category '{selector}'",
            contract.contract_id
        );
        let policies = self.library.policies_by_category(selector);
        self.evaluate_policies(contract, policies, options).await
    }

    /// Evaluates a contract against every non-test policy under a folder
    ///
    /// # Errors
    ///
    /// Only configuration-level failures return `Err`.
    pub async fn evaluate_by_folder(
        &self,
        contract: &Contract,
        folder: &Path,
        options: &EvaluationOptions,
    ) -> Result<EvaluationOutcome> {
        info!(
            "Evaluating contract {} against folder '{}'",
            contract.contract_id,
            folder.display()
        );
        let policies = self.library.policies_by_folder(folder);
        self.evaluate_policies(contract, policies, options).await
    }

    async fn evaluate_policies(
        &self,
        contract: &Contract,
        policies: Vec<&Policy>,
        options: &EvaluationOptions,
    ) -> Result<EvaluationOutcome> {
        if policies.is_empty() {
            warn!("No policies matched; returning an empty, compliant outcome");
            return Ok(EvaluationOutcome {
                contract_id: contract.contract_id,
                application_name: contract.application_name.clone(),
                metric_document: Map::new(),
                parameters: Map::new(),
                raw_engine_results: Map::new(),
                policy_results: Vec::new(),
                overall_passed: true,
            });
        }

        // 1-2. required metrics and merged parameter defaults
        let metrics: Vec<String> = required_metrics(&policies).into_iter().collect();
        info!("Required metrics for selection: {metrics:?}");

        let mut parameters: Map<String, Value> = required_params(&policies)
            .into_iter()
            .map(|(name, value)| (name, Value::from(value)))
            .collect();
        for (name, value) in &options.custom_params {
            parameters.insert(name.clone(), value.clone());
        }

        // 3-4. evaluator discovery and dispatch
        let dispatch = dispatch_evaluators(contract, &metrics, &options.evaluator_config).await;

        // 5. engine input document
        let input = build_input(contract, &dispatch.metric_document, &parameters);

        if self.engine.is_remote() {
            let all: Vec<&Policy> = self.library.all_policies().iter().collect();
            self.engine.upload_policies(&all).await?;
        }

        // 6. per-policy engine invocations, bounded and order-preserving
        let worker_count = options.worker_count.max(1);
        let decisions: Vec<(&Policy, Value)> = futures::stream::iter(policies.iter().map(
            |policy| {
                let input = &input;
                async move {
                    let closure = resolve_dependencies(&self.library, &[*policy]);
                    let query = query_for_policy(&self.library, policy);
                    debug!("Evaluating policy {} with query {query}", policy.stem());
                    let decision = self
                        .engine
                        .evaluate_policy(&closure, input, &query, options.mode, options.deadline)
                        .await;
                    (*policy, decision)
                }
            },
        ))
        .buffered(worker_count)
        .collect()
        .await;

        // 7. extraction and aggregation
        let mut raw_engine_results = Map::new();
        let mut policy_results = Vec::new();
        for (policy, decision) in decisions {
            let stem = policy.stem();
            raw_engine_results.insert(stem.clone(), decision.clone());

            let extracted = extract_all_policy_results(&decision);
            let result = match pick_result_for(&stem, extracted) {
                Some(mut result) => {
                    result.policy_id = policy.path.display().to_string();
                    result
                }
                None => {
                    let error = decision["error"]
                        .as_str()
                        .unwrap_or("No compliance report in engine output");
                    warn!("Policy '{stem}' produced no extractable result: {error}");
                    PolicyResult::failed(&policy.path.display().to_string(), &stem, error)
                }
            };
            policy_results.push(result);
        }

        let overall_passed = dispatch.all_compliant && policy_results.iter().all(|r| r.result);
        info!(
            "Evaluation complete: {} policies, overall passed: {overall_passed}",
            policy_results.len()
        );

        Ok(EvaluationOutcome {
            contract_id: contract.contract_id,
            application_name: contract.application_name.clone(),
            metric_document: dispatch.metric_document,
            parameters,
            raw_engine_results,
            policy_results,
            overall_passed,
        })
    }
}

/// Picks the extracted record matching the policy stem, falling back to the
/// first record when the decision document names the policy differently
fn pick_result_for(stem: &str, extracted: Vec<PolicyResult>) -> Option<PolicyResult> {
    if extracted.is_empty() {
        return None;
    }
    let lowered = stem.to_lowercase();
    let position = extracted.iter().position(|r| {
        r.policy_name.to_lowercase() == lowered
            || r.policy_name.to_lowercase().replace(' ', "_") == lowered
    });
    let index = position.unwrap_or(0);
    extracted.into_iter().nth(index)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::engine::OpaBinary;
    use crate::models::{ContractBuilder, Interaction, ModelInfo};
    use serde_json::json;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn write_policy(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
    }

    fn sample_library(dir: &TempDir) -> Arc<PolicyLibrary> {
        let root = dir.path().join("policies");
        write_policy(
            &root,
            "international/eu_ai_act/v1/transparency/transparency.rego",
            "# RequiredMetrics:\n#   - model_card.completeness\n\
             # RequiredParams:\n#   - compliance_threshold (default 0.7)\n\
             package international.eu_ai_act.v1.transparency\n\ndefault allow := false\n",
        );
        write_policy(
            &root,
            "international/eu_ai_act/v1/fairness/fairness.rego",
            "# RequiredMetrics:\n#   - fairness.counterfactual_score\n\
             package international.eu_ai_act.v1.fairness\n\ndefault allow := false\n",
        );
        Arc::new(PolicyLibrary::open(root).unwrap())
    }

    fn fake_engine(dir: &TempDir) -> OpaEvaluator {
        let script = dir.path().join("opa");
        fs::write(
            &script,
            r#"#!/bin/sh
cat > /dev/null
name=$(echo "$2" | sed 's/^data\.//; s/\.compliance_report$//; s/.*\.//')
echo "{\"result\":[{\"expressions\":[{\"value\":{\"policy\":\"$name\",\"overall_result\":true,\"metrics\":{}}}]}]}"
"#,
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        OpaEvaluator::with_binary(OpaBinary::with_path(script))
    }

    fn test_contract() -> Contract {
        ContractBuilder::new()
            .application_name("HealthcareGPT")
            .model_info(ModelInfo::new("gpt-4o-mini"))
            .interaction(Interaction::new(
                "What should I do about my symptoms?",
                "Please consult a licensed medical professional for advice.",
            ))
            .context_entry("domain", json!("healthcare"))
            .context_entry("patient_data", json!({"anonymized": true}))
            .context_entry("risk_documentation", json!("assessment on file"))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_category_evaluation_produces_one_result_per_policy() {
        let dir = TempDir::new().unwrap();
        let orchestrator = ComplianceOrchestrator::new(sample_library(&dir), fake_engine(&dir));

        let outcome = orchestrator
            .evaluate_by_category(&test_contract(), "eu_ai_act", &EvaluationOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.policy_results.len(), 2);
        assert!(outcome.policy_results.iter().all(|r| r.result));
        assert_eq!(outcome.raw_engine_results.len(), 2);
        // metric document carries the dispatched evaluators' outputs
        assert!(outcome.metric_document.contains_key("model_card"));
        assert!(outcome.metric_document.contains_key("fairness"));
        // declared parameter defaults survive into the merged map
        assert_eq!(outcome.parameters["compliance_threshold"], json!(0.7));
    }

    #[tokio::test]
    async fn test_results_preserve_library_enumeration_order() {
        let dir = TempDir::new().unwrap();
        let library = sample_library(&dir);
        let expected: Vec<String> = library
            .policies_by_category("eu_ai_act")
            .iter()
            .map(|p| p.stem())
            .collect();

        let orchestrator = ComplianceOrchestrator::new(library, fake_engine(&dir));
        let outcome = orchestrator
            .evaluate_by_category(&test_contract(), "eu_ai_act", &EvaluationOptions::default())
            .await
            .unwrap();

        let got: Vec<&String> = outcome
            .policy_results
            .iter()
            .map(|r| &r.policy_name)
            .collect();
        assert_eq!(got, expected.iter().collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_unknown_selector_yields_empty_compliant_outcome() {
        let dir = TempDir::new().unwrap();
        let orchestrator = ComplianceOrchestrator::new(sample_library(&dir), fake_engine(&dir));

        let outcome = orchestrator
            .evaluate_by_category(
                &test_contract(),
                "unknown_regulation",
                &EvaluationOptions::default(),
            )
            .await
            .unwrap();

        assert!(outcome.policy_results.is_empty());
        assert!(outcome.overall_passed);
    }

    #[tokio::test]
    async fn test_folder_evaluation_matches_category_evaluation() {
        let dir = TempDir::new().unwrap();
        let orchestrator = ComplianceOrchestrator::new(sample_library(&dir), fake_engine(&dir));

        let by_category = orchestrator
            .evaluate_by_category(&test_contract(), "eu_ai_act", &EvaluationOptions::default())
            .await
            .unwrap();
        let by_folder = orchestrator
            .evaluate_by_folder(
                &test_contract(),
                Path::new("international/eu_ai_act"),
                &EvaluationOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(
            by_category.policy_results.len(),
            by_folder.policy_results.len()
        );
    }

    #[tokio::test]
    async fn test_engine_failure_becomes_failed_policy_result() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("opa");
        fs::write(&script, "#!/bin/sh\ncat > /dev/null\necho 'boom' >&2\nexit 1\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        let engine = OpaEvaluator::with_binary(OpaBinary::with_path(script));

        let orchestrator = ComplianceOrchestrator::new(sample_library(&dir), engine);
        let outcome = orchestrator
            .evaluate_by_category(&test_contract(), "eu_ai_act", &EvaluationOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.policy_results.len(), 2);
        assert!(outcome.policy_results.iter().all(|r| !r.result));
        assert!(!outcome.overall_passed);
        assert!(
            outcome.policy_results[0].details["error"]
                .as_str()
                .unwrap()
                .contains("non-zero exit")
        );
    }

    #[tokio::test]
    async fn test_custom_params_override_declared_defaults() {
        let dir = TempDir::new().unwrap();
        let orchestrator = ComplianceOrchestrator::new(sample_library(&dir), fake_engine(&dir));

        let mut options = EvaluationOptions::default();
        options
            .custom_params
            .insert("compliance_threshold".to_string(), json!(0.9));
        let outcome = orchestrator
            .evaluate_by_category(&test_contract(), "eu_ai_act", &options)
            .await
            .unwrap();

        assert_eq!(outcome.parameters["compliance_threshold"], json!(0.9));
    }

    #[test]
    fn test_cached_library_open_is_reused() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("policies");
        write_policy(
            &root,
            "global/v1/accountability/accountability.rego",
            "package global.v1.accountability\n\ndefault allow := true\n",
        );

        let first = open_cached_library(&root).unwrap();
        let second = open_cached_library(&root).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
