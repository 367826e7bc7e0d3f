//! Builtin reference evaluators
//!
//! Deterministic evaluators producing the core metric families: content
//! safety, fairness, and model-card completeness. They score from the
//! contract alone (lexicon and documentation-structure heuristics) so
//! results are reproducible without model inference.

mod content_safety;
mod fairness;
mod model_card;

pub use content_safety::ContentSafetyEvaluator;
pub use fairness::FairnessEvaluator;
pub use model_card::ModelCardEvaluator;

use super::EvaluatorFactory;

/// Factories for every builtin evaluator
#[must_use]
pub fn factories() -> Vec<EvaluatorFactory> {
    vec![
        content_safety::factory(),
        fairness::factory(),
        model_card::factory(),
    ]
}

/// Reads an `f64` option from an evaluator configuration bag
pub(crate) fn config_f64(
    config: &serde_json::Map<String, serde_json::Value>,
    key: &str,
    default: f64,
) -> f64 {
    config.get(key).and_then(serde_json::Value::as_f64).unwrap_or(default)
}
