//! End-to-end compliance evaluation flow
//!
//! Exercises the full pipeline with a fixture policy library and a fake OPA
//! binary that records its invocations: selector resolution, metric
//! aggregation, evaluator dispatch, dependency closure, engine invocation,
//! and result extraction.

#![cfg(unix)]

use attest_core::engine::{OpaBinary, OpaEvaluator};
use attest_core::models::{ContractBuilder, Interaction, ModelInfo};
use attest_core::orchestrator::{ComplianceOrchestrator, EvaluationOptions};
use attest_core::policy::PolicyLibrary;
use serde_json::json;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn write_policy(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
}

fn fixture_library(dir: &TempDir) -> Arc<PolicyLibrary> {
    let root = dir.path().join("policies");
    write_policy(
        &root,
        "international/eu_ai_act/v1/transparency/transparency.rego",
        "# Transparency controls for the EU AI Act\n\
         # RequiredMetrics:\n\
         #   - model_card.completeness\n\
         #   - toxicity.score\n\
         # RequiredParams:\n\
         #   - toxicity_threshold (default 0.1)\n\
         package international.eu_ai_act.v1.transparency\n\n\
         import data.common.fairness.v1 as fairness\n\n\
         default allow := false\n",
    );
    write_policy(
        &root,
        "global/v1/common/fairness.rego",
        "package common.fairness.v1\n\ncounterfactual := 0.9\n",
    );
    Arc::new(PolicyLibrary::open(root).unwrap())
}

/// Fake OPA that appends each invocation's arguments to a log file and
/// returns a fixed compliance report
fn recording_engine(dir: &TempDir) -> (OpaEvaluator, std::path::PathBuf) {
    let log = dir.path().join("opa_args.log");
    let script = dir.path().join("opa");
    fs::write(
        &script,
        format!(
            "#!/bin/sh\ncat > /dev/null\necho \"$@\" >> {}\n\
             echo '{{\"result\":[{{\"expressions\":[{{\"value\":{{\
             \"policy\":\"transparency\",\"overall_result\":true,\
             \"metrics\":{{\"model_card.completeness\":{{\"control_passed\":true,\
             \"name\":\"Model Card Completeness\",\"value\":0.92}}}},\
             \"timestamp\":1700000000}}}}]}}]}}'\n",
            log.display()
        ),
    )
    .unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    (
        OpaEvaluator::with_binary(OpaBinary::with_path(script)),
        log,
    )
}

fn healthcare_contract() -> attest_core::models::Contract {
    ContractBuilder::new()
        .application_name("HealthcareGPT")
        .model_info(ModelInfo::new("gpt-4o-mini"))
        .interaction(Interaction::new(
            "I have a headache, what should I do?",
            "Please consult a licensed medical professional for advice.",
        ))
        .context_entry("domain", json!("healthcare"))
        .context_entry("patient_data", json!({"anonymized": true}))
        .context_entry("risk_documentation", json!("risk assessment attached"))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_eu_ai_act_flow_end_to_end() {
    let dir = TempDir::new().unwrap();
    let library = fixture_library(&dir);
    let (engine, args_log) = recording_engine(&dir);
    let orchestrator = ComplianceOrchestrator::new(library, engine);

    let outcome = orchestrator
        .evaluate_by_category(
            &healthcare_contract(),
            "eu_ai_act",
            &EvaluationOptions::default(),
        )
        .await
        .unwrap();

    // one PolicyResult per policy under the selector
    assert_eq!(outcome.policy_results.len(), 1);
    let result = &outcome.policy_results[0];
    assert_eq!(result.policy_name, "transparency");
    assert!(result.result);
    assert_eq!(
        result.metrics["model_card.completeness"].value,
        json!(0.92)
    );

    // the declared parameter default reached the engine input
    assert_eq!(outcome.parameters["toxicity_threshold"], json!(0.1));

    // evaluators covering the required metrics ran
    assert!(outcome.metric_document.contains_key("model_card"));
    assert!(outcome.metric_document.contains_key("content_safety"));

    // the dependency closure handed both files to the engine
    let recorded = fs::read_to_string(&args_log).unwrap();
    assert!(recorded.contains("transparency.rego"));
    assert!(recorded.contains("common/fairness.rego"));
    assert!(recorded.contains("data.international.eu_ai_act.v1.transparency.compliance_report"));
}

#[tokio::test]
async fn test_selector_variants_resolve_identically() {
    let dir = TempDir::new().unwrap();
    let library = fixture_library(&dir);
    let (engine, _log) = recording_engine(&dir);
    let orchestrator = ComplianceOrchestrator::new(library, engine);
    let contract = healthcare_contract();

    let slash = orchestrator
        .evaluate_by_category(&contract, "international/eu_ai_act", &EvaluationOptions::default())
        .await
        .unwrap();
    let backslash = orchestrator
        .evaluate_by_category(
            &contract,
            "international\\eu_ai_act",
            &EvaluationOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(slash.policy_results.len(), backslash.policy_results.len());
    assert_eq!(slash.policy_results[0].policy_id, backslash.policy_results[0].policy_id);
}

#[tokio::test]
async fn test_contract_with_no_interactions_depends_on_policy_defaults() {
    let dir = TempDir::new().unwrap();
    let library = fixture_library(&dir);
    let (engine, _log) = recording_engine(&dir);
    let orchestrator = ComplianceOrchestrator::new(library, engine);

    let contract = ContractBuilder::new()
        .application_name("EmptyTrace")
        .model_info(ModelInfo::new("gpt-4o-mini"))
        .build()
        .unwrap();

    let outcome = orchestrator
        .evaluate_by_category(&contract, "eu_ai_act", &EvaluationOptions::default())
        .await
        .unwrap();

    // resolution and aggregation still succeed; the engine decision stands
    assert_eq!(outcome.policy_results.len(), 1);
    assert!(outcome.policy_results[0].result);
}
