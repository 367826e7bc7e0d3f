//! Decision document extraction
//!
//! Parses raw OPA decision documents into [`PolicyResult`] records. The
//! engine's JSON output nests the decision value at
//! `result[0].expressions[0].value`; the remote server returns it directly
//! under `result`. Inside the value, compliance reports are keyed either by
//! version segment (`v1`, `v2`, ...) and policy display name, or flat.
//!
//! All shape checks are defensive: a document that diverges from the
//! expected schema produces warnings naming the divergent path and an empty
//! result list, never a panic or error.

use crate::models::{MetricEvidence, PolicyResult};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Report keys lifted into dedicated [`PolicyResult`] fields; everything
/// else lands in `details`
const LIFTED_KEYS: &[&str] = &[
    "compliant",
    "overall_result",
    "result",
    "policy",
    "metrics",
    "recommendations",
    "timestamp",
];

/// Checks that a decision document has the expected top-level shape
#[must_use]
pub fn validate_decision(document: &Value) -> bool {
    decision_value(document).is_some()
}

/// Extracts results for every policy found in a decision document
///
/// Returns an empty list (with warnings) when the document does not match
/// the expected schema.
#[must_use]
pub fn extract_all_policy_results(document: &Value) -> Vec<PolicyResult> {
    let Some(value) = decision_value(document) else {
        return Vec::new();
    };

    let mut results = Vec::new();
    let mut seen = std::collections::BTreeSet::new();

    for (policy_name, policy_data) in iter_policies(value) {
        if !seen.insert(policy_name.clone()) {
            continue;
        }
        results.push(policy_result_from_data(&policy_name, &policy_name, policy_data));
    }

    info!("Extracted results for {} policies", results.len());
    results
}

/// Extracts the result for one policy, tolerant to snake_case / Title Case
/// differences between the requested name and the decision document's keys
#[must_use]
pub fn extract_policy_results(document: &Value, policy_name: &str) -> Option<PolicyResult> {
    let value = decision_value(document)?;

    let candidates = name_variants(policy_name);
    for (found_name, policy_data) in iter_policies(value) {
        if candidates.contains(&found_name) || candidates.contains(&found_name.to_lowercase()) {
            debug!("Found policy data for '{policy_name}' under key '{found_name}'");
            return Some(policy_result_from_data(policy_name, &found_name, policy_data));
        }
    }

    warn!("Policy '{policy_name}' not found in decision document");
    None
}

/// Navigates to the decision value, logging the path of any divergence
fn decision_value(document: &Value) -> Option<&Value> {
    if !document.is_object() {
        warn!("Invalid decision document: not an object");
        return None;
    }
    if document.get("error").is_some_and(|e| !e.is_null()) {
        warn!(
            "Decision document carries an error: {}",
            document["error"].as_str().unwrap_or("unknown")
        );
        return None;
    }

    let Some(result) = document.get("result") else {
        warn!("Invalid decision document: missing 'result' key");
        return None;
    };

    match result {
        // Embedded binary shape: result[0].expressions[0].value
        Value::Array(items) => {
            let Some(first) = items.first() else {
                warn!("Invalid decision document: 'result' is an empty list");
                return None;
            };
            let Some(expressions) = first.get("expressions").and_then(Value::as_array) else {
                warn!("Invalid decision document: missing 'result[0].expressions'");
                return None;
            };
            let Some(value) = expressions.first().and_then(|e| e.get("value")) else {
                warn!("Invalid decision document: missing 'result[0].expressions[0].value'");
                return None;
            };
            Some(value)
        }
        // Remote server shape: the value sits directly under 'result'
        Value::Object(_) => Some(result),
        _ => {
            warn!("Invalid decision document: 'result' is neither a list nor an object");
            None
        }
    }
}

/// Iterates `(policy_name, policy_data)` pairs inside a decision value,
/// handling the version-keyed shape (with `v1` prioritized), the flat
/// shape, and a bare single-report value
fn iter_policies(value: &Value) -> Vec<(String, &Value)> {
    let Some(object) = value.as_object() else {
        warn!("Decision value is not an object");
        return Vec::new();
    };

    // A synthesized or single-policy report sits directly at the value
    if looks_like_report(object) {
        let name = object
            .get("policy")
            .and_then(Value::as_str)
            .unwrap_or("policy")
            .to_string();
        return vec![(name, value)];
    }

    let mut version_keys: Vec<&String> =
        object.keys().filter(|k| is_version_key(k)).collect();
    if version_keys.is_empty() {
        // Flat shape: policy display name -> report
        debug!("Decision value has no version keys; treating as flat policy map");
        return object
            .iter()
            .filter(|(_, v)| v.is_object())
            .map(|(k, v)| (k.clone(), v))
            .collect();
    }

    version_keys.sort_by_key(|k| version_rank(k));
    let mut pairs = Vec::new();
    for version_key in version_keys {
        let Some(version_data) = object.get(version_key.as_str()).and_then(Value::as_object)
        else {
            warn!("Version '{version_key}' data is not an object");
            continue;
        };
        for (policy_name, policy_data) in version_data {
            pairs.push((policy_name.clone(), policy_data));
        }
    }
    pairs
}

fn is_version_key(key: &str) -> bool {
    key.strip_prefix('v')
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

fn version_rank(key: &str) -> u64 {
    // v1 first, then ascending
    key.strip_prefix('v')
        .and_then(|rest| rest.parse().ok())
        .unwrap_or(u64::MAX)
}

fn looks_like_report(object: &Map<String, Value>) -> bool {
    object.contains_key("compliance_report")
        || object.contains_key("overall_result")
        || object.contains_key("compliant")
        || (object.contains_key("policy") && object.contains_key("result"))
}

fn name_variants(policy_name: &str) -> Vec<String> {
    let titled = policy_name
        .replace('_', " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |c| {
                c.to_uppercase().collect::<String>() + chars.as_str()
            })
        })
        .collect::<Vec<_>>()
        .join(" ");
    let snake = policy_name.to_lowercase().replace(' ', "_");
    vec![policy_name.to_string(), titled, snake]
}

/// Builds a [`PolicyResult`] from one policy's data node
///
/// The node is either `{"compliance_report": {...}}` or the report itself.
/// A node of unexpected shape synthesizes a failed result with the error
/// recorded in `details`.
fn policy_result_from_data(policy_id: &str, policy_name: &str, data: &Value) -> PolicyResult {
    let report = match data.get("compliance_report") {
        Some(report) if report.is_object() => report,
        Some(other) => {
            warn!("Compliance report for '{policy_name}' is not an object: {other}");
            return PolicyResult::failed(
                policy_id,
                policy_name,
                &format!("Invalid compliance report format for policy {policy_name}"),
            );
        }
        None if data.is_object() => data,
        None => {
            warn!("No compliance report found for policy '{policy_name}'");
            return PolicyResult::failed(
                policy_id,
                policy_name,
                &format!("No compliance report found for policy {policy_name}"),
            );
        }
    };
    let Some(report_map) = report.as_object() else {
        return PolicyResult::failed(policy_id, policy_name, "compliance report is not an object");
    };

    let result = report_map
        .get("compliant")
        .or_else(|| report_map.get("overall_result"))
        .or_else(|| report_map.get("result"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let display_name = report_map
        .get("policy")
        .and_then(Value::as_str)
        .unwrap_or(policy_name)
        .to_string();

    let mut metrics = BTreeMap::new();
    if let Some(metric_map) = report_map.get("metrics").and_then(Value::as_object) {
        for (metric_id, entry) in metric_map {
            metrics.insert(
                metric_id.clone(),
                MetricEvidence {
                    control_passed: entry
                        .get("control_passed")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                    name: entry
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or(metric_id)
                        .to_string(),
                    value: entry.get("value").cloned().unwrap_or(Value::Null),
                },
            );
        }
    }

    let recommendations = report_map
        .get("recommendations")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    let mut details = Map::new();
    for (key, value) in report_map {
        if !LIFTED_KEYS.contains(&key.as_str()) {
            details.insert(key.clone(), value.clone());
        }
    }

    PolicyResult {
        policy_id: policy_id.to_string(),
        policy_name: display_name,
        result,
        metrics,
        recommendations,
        details,
        timestamp: report_map.get("timestamp").cloned(),
    }
}
