//! Metric evaluators for Attest
//!
//! Evaluators produce quantitative metrics from a contract's interaction
//! trace. Each evaluator declares the set of dotted metric identifiers it
//! can produce; the registry maps metric identifiers back to evaluator
//! factories so the orchestrator can run exactly the evaluators a policy
//! set requires.

mod builtin;
mod dispatch;
mod registry;

pub use builtin::{ContentSafetyEvaluator, FairnessEvaluator, ModelCardEvaluator};
pub use dispatch::{DispatchOutcome, dispatch_evaluators};
pub use registry::{
    all_evaluators, all_metrics, clear_registry, discover_for_metrics, evaluators_for_metric,
    initialize_registry, is_registered, metrics_for_evaluator, register_evaluator,
};

use crate::error::Result;
use crate::models::{Contract, MetricValue};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Output of a single evaluator run
///
/// Emitted as one atomic document; no reader observes a partially filled
/// evaluator output.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvaluatorOutput {
    /// The evaluator's overall compliance indicator
    pub compliant: bool,
    /// Produced metrics keyed by dotted identifier
    pub metrics: BTreeMap<String, MetricValue>,
    /// Free-form details about the run
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

impl EvaluatorOutput {
    /// Creates an output with the given overall indicator
    #[must_use]
    pub fn new(compliant: bool) -> Self {
        Self {
            compliant,
            metrics: BTreeMap::new(),
            details: Map::new(),
        }
    }

    /// Adds a metric to the output
    pub fn push_metric(&mut self, metric: MetricValue) {
        self.metrics.insert(metric.name.clone(), metric);
    }
}

/// A metric evaluator
///
/// Evaluators are pure with respect to their inputs: the same contract and
/// configuration produce the same output. They may perform I/O and must be
/// suspendable without blocking unrelated work, hence the async evaluate
/// operation.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Short evaluator name, used as the key in metric documents and
    /// configuration maps
    fn name(&self) -> &'static str;

    /// Metric identifiers this evaluator can produce
    fn supported_metrics(&self) -> &'static [&'static str];

    /// Evaluates a contract and produces a metric document fragment
    async fn evaluate(&self, contract: &Contract) -> Result<EvaluatorOutput>;
}

/// Constructor-level descriptor for an evaluator
///
/// The registry stores these descriptors, never evaluator instances; an
/// evaluator is constructed per dispatch with its effective configuration
/// (defaults merged with caller overrides).
#[derive(Clone, Copy)]
pub struct EvaluatorFactory {
    /// Evaluator name (identity key in the registry)
    pub name: &'static str,
    /// Metric identifiers the evaluator supports, fixed at registration
    pub supported_metrics: &'static [&'static str],
    /// Produces the evaluator's built-in default configuration
    pub default_config: fn() -> Map<String, Value>,
    /// Builds an evaluator instance from an effective configuration
    pub build: fn(&Map<String, Value>) -> Arc<dyn Evaluator>,
}

impl std::fmt::Debug for EvaluatorFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluatorFactory")
            .field("name", &self.name)
            .field("supported_metrics", &self.supported_metrics)
            .finish_non_exhaustive()
    }
}

impl EvaluatorFactory {
    /// Merges caller overrides onto this evaluator's default configuration
    #[must_use]
    pub fn effective_config(&self, overrides: Option<&Value>) -> Map<String, Value> {
        let mut config = (self.default_config)();
        if let Some(Value::Object(overrides)) = overrides {
            for (key, value) in overrides {
                config.insert(key.clone(), value.clone());
            }
        }
        config
    }
}
