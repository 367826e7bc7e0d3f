//! Model card completeness evaluator
//!
//! Scores the documentation attached to a contract's model info: which of
//! the expected model card sections are present, and how substantial the
//! free-text content is.

use super::config_f64;
use crate::error::Result;
use crate::evaluator::{Evaluator, EvaluatorFactory, EvaluatorOutput};
use crate::models::{Contract, MetricValue};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// Sections a complete model card is expected to carry
const EXPECTED_SECTIONS: &[&str] = &[
    "model_type",
    "organization",
    "primary_uses",
    "description",
    "performance_metrics",
    "training_data",
    "ethical_considerations",
    "limitations",
    "mitigation_strategies",
    "usage_guidelines",
];

/// Content length (characters) below which a card counts as minimal
const DEFAULT_MINIMAL_LENGTH: f64 = 50.0;
/// Content length at which a card counts as comprehensive
const DEFAULT_COMPREHENSIVE_LENGTH: f64 = 500.0;

/// Model card completeness evaluator
#[derive(Debug)]
pub struct ModelCardEvaluator {
    compliance_threshold: f64,
    minimal_length: f64,
    comprehensive_length: f64,
}

impl ModelCardEvaluator {
    /// Evaluator name used in metric documents and configuration maps
    pub const NAME: &'static str = "model_card";

    /// Metrics this evaluator produces
    pub const SUPPORTED_METRICS: &'static [&'static str] =
        &["model_card.completeness", "model_card.score"];

    /// Creates an evaluator from an effective configuration
    #[must_use]
    pub fn from_config(config: &Map<String, Value>) -> Self {
        let quality = config
            .get("content_quality_thresholds")
            .and_then(Value::as_object);
        let quality_f64 = |key: &str, default: f64| {
            quality
                .and_then(|q| q.get(key))
                .and_then(Value::as_f64)
                .unwrap_or(default)
        };
        Self {
            compliance_threshold: config_f64(config, "compliance_threshold", 0.7),
            minimal_length: quality_f64("minimal", DEFAULT_MINIMAL_LENGTH),
            comprehensive_length: quality_f64("comprehensive", DEFAULT_COMPREHENSIVE_LENGTH),
        }
    }

    fn content_length(card: &Map<String, Value>) -> usize {
        card.values()
            .map(|value| match value {
                Value::String(s) => s.len(),
                Value::Array(items) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::len)
                    .sum(),
                Value::Object(o) => Self::content_length(o),
                _ => 0,
            })
            .sum()
    }
}

pub(super) fn factory() -> EvaluatorFactory {
    EvaluatorFactory {
        name: ModelCardEvaluator::NAME,
        supported_metrics: ModelCardEvaluator::SUPPORTED_METRICS,
        default_config: || {
            let mut config = Map::new();
            config.insert("compliance_threshold".to_string(), json!(0.7));
            config.insert(
                "content_quality_thresholds".to_string(),
                json!({"minimal": 50, "partial": 200, "comprehensive": 500}),
            );
            config
        },
        build: |config| Arc::new(ModelCardEvaluator::from_config(config)) as Arc<dyn Evaluator>,
    }
}

#[async_trait]
impl Evaluator for ModelCardEvaluator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn supported_metrics(&self) -> &'static [&'static str] {
        Self::SUPPORTED_METRICS
    }

    async fn evaluate(&self, contract: &Contract) -> Result<EvaluatorOutput> {
        let card = contract.model_info.model_card.as_ref();

        let (completeness, quality) = match card {
            None => (0.0, 0.0),
            Some(card) => {
                let present = EXPECTED_SECTIONS
                    .iter()
                    .filter(|section| {
                        card.get(**section).is_some_and(|v| !v.is_null())
                    })
                    .count();
                let completeness = present as f64 / EXPECTED_SECTIONS.len() as f64;

                let length = Self::content_length(card) as f64;
                let quality = if length < self.minimal_length {
                    0.0
                } else {
                    (length / self.comprehensive_length).min(1.0)
                };
                (completeness, quality)
            }
        };

        // Section coverage dominates; content depth refines the score
        let score = completeness * 0.7 + quality * 0.3;
        let compliant = score >= self.compliance_threshold;

        let mut output = EvaluatorOutput::new(compliant);
        output.push_metric(
            MetricValue::new(
                "model_card.completeness",
                "Model Card Completeness",
                json!(completeness),
            )
            .with_control_passed(compliant)
            .with_threshold(self.compliance_threshold),
        );
        output.push_metric(
            MetricValue::new("model_card.score", "Model Card Score", json!(score))
                .with_control_passed(compliant),
        );
        output
            .details
            .insert("model_card_present".to_string(), json!(card.is_some()));
        Ok(output)
    }
}
