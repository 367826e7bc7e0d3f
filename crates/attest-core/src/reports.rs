//! Report assembly and persistence
//!
//! Builds the consumer-facing [`EvaluationReport`] from an evaluation
//! outcome and persists it in the requested formats. Persistence is a data
//! model dump (JSON, or a markdown rendering of the same structures);
//! visual report rendering is left to downstream tooling.

use crate::error::{Error, Result};
use crate::models::{
    ApplicationDetails, Contract, EvaluationReport, MetricGroup, create_metric_group,
};
use crate::orchestrator::EvaluationOutcome;
use chrono::Utc;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// Supported report output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// Machine-readable JSON dump of the report data model
    Json,
    /// Markdown rendering of the report data model
    Markdown,
}

impl ReportFormat {
    /// File extension for the format
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "markdown" | "md" => Ok(Self::Markdown),
            _ => Err(format!("Unsupported report format: {s}")),
        }
    }
}

/// Builds an evaluation report from an orchestrator outcome
#[must_use]
pub fn build_report(outcome: &EvaluationOutcome, contract: &Contract) -> EvaluationReport {
    let mut model_info = Map::new();
    model_info.insert(
        "model_name".to_string(),
        json!(contract.model_info.model_name),
    );
    if let Some(version) = &contract.model_info.model_version {
        model_info.insert("model_version".to_string(), json!(version));
    }

    let app_details = ApplicationDetails {
        name: outcome.application_name.clone(),
        evaluation_mode: "Automatic".to_string(),
        contract_count: 1,
        evaluation_date: Utc::now(),
        model_info,
        metadata: Map::new(),
    };

    let metric_groups = metric_groups_from_document(&outcome.metric_document);

    let mut summary = Map::new();
    summary.insert(
        "policies_evaluated".to_string(),
        json!(outcome.policy_results.len()),
    );
    summary.insert(
        "policies_passed".to_string(),
        json!(outcome.policy_results.iter().filter(|r| r.result).count()),
    );
    summary.insert("overall_passed".to_string(), json!(outcome.overall_passed));

    EvaluationReport {
        app_details,
        metric_groups,
        policy_results: outcome.policy_results.clone(),
        summary,
        created_at: Utc::now(),
    }
}

/// Groups the metric document's metrics by evaluator name
fn metric_groups_from_document(metric_document: &Map<String, Value>) -> Vec<MetricGroup> {
    let mut groups = Vec::new();
    for (evaluator_name, output) in metric_document {
        let Some(metrics) = output.get("metrics").and_then(Value::as_object) else {
            continue;
        };
        let metric_map: BTreeMap<String, Value> = metrics
            .iter()
            .map(|(id, data)| (id.clone(), data.clone()))
            .collect();
        if !metric_map.is_empty() {
            groups.push(create_metric_group(evaluator_name, &metric_map));
        }
    }
    groups
}

/// Persists a report in each requested format
///
/// Files are named `<kind>_<application>_<timestamp>.<ext>` with a local
/// `YYYYMMDD_HHMMSS` timestamp. Returns the written paths.
///
/// # Errors
///
/// Returns an error when the output directory cannot be created or a file
/// cannot be written.
pub fn save_reports(
    report: &EvaluationReport,
    formats: &[ReportFormat],
    output_dir: &Path,
    kind: &str,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;

    let application = report.app_details.name.replace(char::is_whitespace, "_");
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");

    let mut written = Vec::new();
    for format in formats {
        let filename = format!("{kind}_{application}_{timestamp}.{}", format.extension());
        let path = output_dir.join(filename);
        let content = match format {
            ReportFormat::Json => serde_json::to_string_pretty(report)?,
            ReportFormat::Markdown => render_markdown(report),
        };
        std::fs::write(&path, content)?;
        info!("Saved {format:?} report to {}", path.display());
        written.push(path);
    }

    if written.is_empty() {
        return Err(Error::Report("no report formats requested".to_string()));
    }
    Ok(written)
}

/// Renders the report data model as markdown
fn render_markdown(report: &EvaluationReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Evaluation Report: {}", report.app_details.name);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "- Evaluation date: {}",
        report.app_details.evaluation_date.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "- Contracts: {}", report.app_details.contract_count);
    if let Some(overall) = report.summary.get("overall_passed").and_then(Value::as_bool) {
        let _ = writeln!(
            out,
            "- Overall result: {}",
            if overall { "COMPLIANT" } else { "NON-COMPLIANT" }
        );
    }

    for group in &report.metric_groups {
        let _ = writeln!(out);
        let _ = writeln!(out, "## {}", group.display_name);
        let _ = writeln!(out);
        let _ = writeln!(out, "| Metric | Value | Control |");
        let _ = writeln!(out, "|---|---|---|");
        for metric in &group.metrics {
            let name = metric
                .get("display_name")
                .and_then(Value::as_str)
                .unwrap_or("-");
            let value = metric.get("value").map_or_else(String::new, Value::to_string);
            let control = match metric.get("control_passed").and_then(Value::as_bool) {
                Some(true) => "pass",
                Some(false) => "fail",
                None => "-",
            };
            let _ = writeln!(out, "| {name} | {value} | {control} |");
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "## Policy Results");
    let _ = writeln!(out);
    let _ = writeln!(out, "| Policy | Result |");
    let _ = writeln!(out, "|---|---|");
    for policy in &report.policy_results {
        let _ = writeln!(
            out,
            "| {} | {} |",
            policy.policy_name,
            if policy.result { "pass" } else { "fail" }
        );
    }

    let recommendations: Vec<&String> = report
        .policy_results
        .iter()
        .flat_map(|p| p.recommendations.iter())
        .collect();
    if !recommendations.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "## Recommendations");
        let _ = writeln!(out);
        for recommendation in recommendations {
            let _ = writeln!(out, "- {recommendation}");
        }
    }

    out
}
