//! Evaluator dispatch
//!
//! Given the metric set a policy folder requires, the dispatcher selects
//! the covering evaluator factories, constructs each evaluator with its
//! effective configuration, runs them concurrently against the contract,
//! and folds their outputs into a single metric document.

use super::{discover_for_metrics, evaluators_for_metric, initialize_registry};
use crate::models::Contract;
use futures::future::join_all;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Folded result of one dispatch round
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// Metric document: evaluator name -> serialized [`super::EvaluatorOutput`]
    /// (or a diagnostic entry for a failed evaluator)
    pub metric_document: Map<String, Value>,
    /// Logical AND across all evaluator compliance indicators; a failed
    /// evaluator counts as non-compliant
    pub all_compliant: bool,
    /// Diagnostics for evaluators that failed, keyed by evaluator name
    pub errors: BTreeMap<String, String>,
}

impl DispatchOutcome {
    fn empty() -> Self {
        Self {
            metric_document: Map::new(),
            all_compliant: true,
            errors: BTreeMap::new(),
        }
    }
}

/// Runs the evaluators covering `required_metrics` against a contract
///
/// `evaluator_config` maps evaluator names to option bags; a missing bag
/// falls back to the evaluator's built-in defaults. Each discovered
/// evaluator runs exactly once per contract regardless of how many of the
/// required metrics it covers. Evaluators run concurrently and a failing
/// evaluator records a diagnostic entry without aborting the dispatch.
pub async fn dispatch_evaluators<S: AsRef<str>>(
    contract: &Contract,
    required_metrics: &[S],
    evaluator_config: &Map<String, Value>,
) -> DispatchOutcome {
    initialize_registry();

    if required_metrics.is_empty() {
        debug!("No metrics required; evaluator dispatch is a no-op");
        return DispatchOutcome::empty();
    }

    for metric in required_metrics {
        if evaluators_for_metric(metric.as_ref()).is_empty() {
            warn!("No registered evaluator provides metric '{}'", metric.as_ref());
        }
    }

    let factories = discover_for_metrics(required_metrics);
    if factories.is_empty() {
        warn!("No evaluators discovered for the required metric set");
        return DispatchOutcome::empty();
    }

    let runs = factories.iter().map(|factory| {
        let config = factory.effective_config(evaluator_config.get(factory.name));
        let evaluator = (factory.build)(&config);
        let name = factory.name;
        async move {
            debug!("Running evaluator '{name}'");
            (name, evaluator.evaluate(contract).await)
        }
    });

    let mut outcome = DispatchOutcome::empty();
    for (name, result) in join_all(runs).await {
        match result {
            Ok(output) => {
                outcome.all_compliant &= output.compliant;
                match serde_json::to_value(&output) {
                    Ok(value) => {
                        outcome.metric_document.insert(name.to_string(), value);
                    }
                    Err(e) => {
                        warn!("Failed to serialize output of evaluator '{name}': {e}");
                        outcome.all_compliant = false;
                        outcome.errors.insert(name.to_string(), e.to_string());
                        outcome.metric_document.insert(
                            name.to_string(),
                            json!({"compliant": false, "error": e.to_string()}),
                        );
                    }
                }
            }
            Err(e) => {
                warn!("Evaluator '{name}' failed: {e}");
                outcome.all_compliant = false;
                outcome.errors.insert(name.to_string(), e.to_string());
                outcome.metric_document.insert(
                    name.to_string(),
                    json!({"compliant": false, "error": e.to_string()}),
                );
            }
        }
    }

    info!(
        "Dispatch complete: {} evaluators, {} errors, overall compliant: {}",
        factories.len(),
        outcome.errors.len(),
        outcome.all_compliant
    );
    outcome
}
