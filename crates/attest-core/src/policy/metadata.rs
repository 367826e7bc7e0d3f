//! Policy metadata extraction
//!
//! Policies declare the metrics and parameters they need in structured
//! header comments:
//!
//! ```text
//! # RequiredMetrics:
//! #   - fairness.score
//! #   - toxicity.score
//! # RequiredParams:
//! #   - toxicity_threshold (default 0.1)
//! #   - model (default "gpt-4o-mini")
//! ```
//!
//! Missing sections yield empty declarations. Malformed lines inside a
//! section are skipped with a warning; the rest of the section still parses.

use super::library::Policy;
use super::{PolicyError, PolicyLibResult};
use crate::models::ParamValue;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, warn};

static ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*#\s*-\s*(.+)$").expect("valid item regex"));
static PARAM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([^\s(]+)\s*\(default\s+([^)]+)\)").expect("valid param regex")
});

/// Metrics and parameters declared by a single policy file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyMetadata {
    /// Dotted metric identifiers the policy requires
    pub required_metrics: Vec<String>,
    /// Parameter defaults the policy declares
    pub required_params: BTreeMap<String, ParamValue>,
}

impl PolicyMetadata {
    /// True when the policy declares neither metrics nor parameters
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.required_metrics.is_empty() && self.required_params.is_empty()
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    None,
    Metrics,
    Params,
}

/// Parses metadata from policy source text
#[must_use]
pub fn parse_metadata(source: &str) -> PolicyMetadata {
    let mut metadata = PolicyMetadata::default();
    let mut section = Section::None;

    for line in source.lines() {
        let trimmed = line.trim_start();
        if !trimmed.starts_with('#') {
            section = Section::None;
            continue;
        }

        let comment = trimmed.trim_start_matches('#').trim();
        if comment.starts_with("RequiredMetrics:") {
            section = Section::Metrics;
            continue;
        }
        if comment.starts_with("RequiredParams:") {
            section = Section::Params;
            continue;
        }

        let Some(captures) = ITEM_RE.captures(trimmed) else {
            // A comment that is not a list item ends the section
            if section != Section::None {
                section = Section::None;
            }
            continue;
        };
        let item = captures[1].trim();

        match section {
            Section::Metrics => {
                // Strip any trailing comment after the identifier
                let metric = item.split('#').next().unwrap_or(item).trim();
                if metric.is_empty() || metric.contains(char::is_whitespace) {
                    warn!("Skipping malformed metric declaration: '{item}'");
                    continue;
                }
                metadata.required_metrics.push(metric.to_string());
            }
            Section::Params => {
                let Some(param) = PARAM_RE.captures(item) else {
                    warn!("Skipping malformed parameter declaration: '{item}'");
                    continue;
                };
                let name = param[1].to_string();
                let value = ParamValue::parse_literal(&param[2]);
                metadata.required_params.insert(name, value);
            }
            Section::None => {}
        }
    }

    metadata
}

/// Parses metadata from a policy file on disk
///
/// # Errors
///
/// Returns `PolicyError::PolicyUnreadable` if the file cannot be read.
pub fn parse_metadata_file(path: &Path) -> PolicyLibResult<PolicyMetadata> {
    let source = std::fs::read_to_string(path).map_err(|source| PolicyError::PolicyUnreadable {
        path: path.display().to_string(),
        source,
    })?;
    Ok(parse_metadata(&source))
}

/// Union of required metrics across a set of policies
#[must_use]
pub fn required_metrics(policies: &[&Policy]) -> BTreeSet<String> {
    let mut metrics = BTreeSet::new();
    for policy in policies {
        metrics.extend(policy.metadata.required_metrics.iter().cloned());
    }
    debug!(
        "Aggregated {} required metrics across {} policies",
        metrics.len(),
        policies.len()
    );
    metrics
}

/// Merged parameter defaults across a set of policies
///
/// When the same parameter appears in multiple files, the first occurrence
/// wins; since policies are enumerated in a stable order, the merge is
/// deterministic across re-evaluations.
#[must_use]
pub fn required_params(policies: &[&Policy]) -> BTreeMap<String, ParamValue> {
    let mut params = BTreeMap::new();
    for policy in policies {
        for (name, value) in &policy.metadata.required_params {
            params
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY_SOURCE: &str = r#"# EU AI Act transparency policy
#
# RequiredMetrics:
#   - model_card.completeness
#   - toxicity.score  # upper bound applies
# RequiredParams:
#   - toxicity_threshold (default 0.1)
#   - require_model_card (default true)
#   - model (default "gpt-4o-mini")
package international.eu_ai_act.v1.transparency

default allow := false
"#;

    #[test]
    fn test_parse_metrics_and_params() {
        let metadata = parse_metadata(POLICY_SOURCE);
        assert_eq!(
            metadata.required_metrics,
            vec!["model_card.completeness", "toxicity.score"]
        );
        assert_eq!(
            metadata.required_params.get("toxicity_threshold"),
            Some(&ParamValue::Float(0.1))
        );
        assert_eq!(
            metadata.required_params.get("require_model_card"),
            Some(&ParamValue::Bool(true))
        );
        assert_eq!(
            metadata.required_params.get("model"),
            Some(&ParamValue::String("gpt-4o-mini".to_string()))
        );
    }

    #[test]
    fn test_missing_sections_yield_empty_metadata() {
        let metadata = parse_metadata("package a.b.v1\n\ndefault allow := true\n");
        assert!(metadata.is_empty());
    }

    #[test]
    fn test_malformed_line_does_not_abort_section() {
        let source = r"# RequiredParams:
#   - broken_no_default
#   - threshold (default 0.5)
package a.b.v1
";
        let metadata = parse_metadata(source);
        assert_eq!(metadata.required_params.len(), 1);
        assert_eq!(
            metadata.required_params.get("threshold"),
            Some(&ParamValue::Float(0.5))
        );
    }

    #[test]
    fn test_section_ends_at_non_item_comment() {
        let source = r"# RequiredMetrics:
#   - fairness.score
# Some unrelated comment
#   - not_a_metric_anymore
package a.b.v1
";
        let metadata = parse_metadata(source);
        assert_eq!(metadata.required_metrics, vec!["fairness.score"]);
    }

    #[test]
    fn test_parse_metadata_file_missing_path() {
        let result = parse_metadata_file(Path::new("/nonexistent/policy.rego"));
        assert!(matches!(
            result,
            Err(PolicyError::PolicyUnreadable { .. })
        ));
    }
}
