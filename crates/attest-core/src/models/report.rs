//! Report data model
//!
//! Canonical cross-boundary structures for metrics, policy results, and
//! evaluation reports. These are the types persisted by the report writer
//! and consumed by downstream renderers.

use super::evaluation::MetricEvidence;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A named bundle of related metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricGroup {
    /// Identifier for the metric group
    pub name: String,
    /// Human-readable name for the metric group
    pub display_name: String,
    /// Metrics in the group
    #[serde(default)]
    pub metrics: Vec<Map<String, Value>>,
    /// Optional description of the metric group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Result of a single policy evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyResult {
    /// Policy identifier in full path form
    pub policy_id: String,
    /// Display name of the policy
    pub policy_name: String,
    /// Whether the policy was satisfied
    pub result: bool,
    /// Metric evidence keyed by metric identifier
    #[serde(default)]
    pub metrics: BTreeMap<String, MetricEvidence>,
    /// Remediation recommendations from the policy
    #[serde(default)]
    pub recommendations: Vec<String>,
    /// Additional details about the evaluation
    #[serde(default)]
    pub details: Map<String, Value>,
    /// When the decision was produced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
}

impl PolicyResult {
    /// Creates a failed result carrying an error explanation
    #[must_use]
    pub fn failed(policy_id: &str, policy_name: &str, error: &str) -> Self {
        let mut details = Map::new();
        details.insert("error".to_string(), Value::String(error.to_string()));
        Self {
            policy_id: policy_id.to_string(),
            policy_name: policy_name.to_string(),
            result: false,
            metrics: BTreeMap::new(),
            recommendations: Vec::new(),
            details,
            timestamp: None,
        }
    }
}

/// Details about the application being evaluated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationDetails {
    /// Application name
    pub name: String,
    /// Evaluation mode label
    #[serde(default = "default_evaluation_mode")]
    pub evaluation_mode: String,
    /// Number of contracts covered by the report
    #[serde(default)]
    pub contract_count: usize,
    /// Date and time of evaluation (UTC)
    #[serde(default = "Utc::now")]
    pub evaluation_date: DateTime<Utc>,
    /// Model information snapshot
    #[serde(default)]
    pub model_info: Map<String, Value>,
    /// Additional metadata
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

fn default_evaluation_mode() -> String {
    "Standard".to_string()
}

/// Complete evaluation report for an AI application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Details about the application being evaluated
    pub app_details: ApplicationDetails,
    /// Metric groups with their metrics
    #[serde(default)]
    pub metric_groups: Vec<MetricGroup>,
    /// Policy evaluation results
    #[serde(default)]
    pub policy_results: Vec<PolicyResult>,
    /// Summary information
    #[serde(default)]
    pub summary: Map<String, Value>,
    /// When the report was created
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl EvaluationReport {
    /// True when every policy in the report passed
    #[must_use]
    pub fn all_policies_passed(&self) -> bool {
        self.policy_results.iter().all(|p| p.result)
    }
}

/// Builds a metric group from a category name and its metrics
///
/// The display name is derived by capitalizing the underscore-separated
/// category segments.
#[must_use]
pub fn create_metric_group(category: &str, metrics: &BTreeMap<String, Value>) -> MetricGroup {
    let display_name = category
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |c| {
                c.to_uppercase().collect::<String>() + chars.as_str()
            })
        })
        .collect::<Vec<_>>()
        .join(" ");

    let metric_values = metrics
        .iter()
        .map(|(metric_id, metric_data)| {
            let mut entry = Map::new();
            entry.insert("name".to_string(), Value::String(metric_id.clone()));
            entry.insert(
                "display_name".to_string(),
                metric_data
                    .get("display_name")
                    .or_else(|| metric_data.get("name"))
                    .cloned()
                    .unwrap_or_else(|| Value::String(metric_id.clone())),
            );
            entry.insert(
                "value".to_string(),
                metric_data.get("value").cloned().unwrap_or(Value::Null),
            );
            if let Some(passed) = metric_data.get("control_passed") {
                entry.insert("control_passed".to_string(), passed.clone());
            }
            entry
        })
        .collect();

    MetricGroup {
        name: category.to_lowercase().replace(' ', "_"),
        display_name,
        metrics: metric_values,
        description: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_metric_group_display_name() {
        let mut metrics = BTreeMap::new();
        metrics.insert(
            "fairness.score".to_string(),
            json!({"name": "Fairness Score", "value": 0.9, "control_passed": true}),
        );
        let group = create_metric_group("content_safety", &metrics);

        assert_eq!(group.name, "content_safety");
        assert_eq!(group.display_name, "Content Safety");
        assert_eq!(group.metrics.len(), 1);
        assert_eq!(group.metrics[0]["display_name"], json!("Fairness Score"));
    }

    #[test]
    fn test_create_metric_group_falls_back_to_metric_id() {
        let mut metrics = BTreeMap::new();
        metrics.insert("toxicity.score".to_string(), json!({"value": 0.1}));
        let group = create_metric_group("toxicity", &metrics);
        assert_eq!(group.metrics[0]["display_name"], json!("toxicity.score"));
    }

    #[test]
    fn test_failed_policy_result_carries_error() {
        let result = PolicyResult::failed("international.eu_ai_act", "EU AI Act", "no report");
        assert!(!result.result);
        assert_eq!(result.details["error"], json!("no report"));
    }

    #[test]
    fn test_all_policies_passed() {
        let report = EvaluationReport {
            app_details: ApplicationDetails {
                name: "App".to_string(),
                evaluation_mode: "Standard".to_string(),
                contract_count: 1,
                evaluation_date: Utc::now(),
                model_info: Map::new(),
                metadata: Map::new(),
            },
            metric_groups: Vec::new(),
            policy_results: vec![
                PolicyResult::failed("a", "A", "x"),
            ],
            summary: Map::new(),
            created_at: Utc::now(),
        };
        assert!(!report.all_policies_passed());
    }
}
