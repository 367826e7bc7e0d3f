//! Evaluator registry
//!
//! Process-wide mapping from metric identifier to the evaluator factories
//! that can produce it, plus the inverse mapping. The registry is a
//! lazily-initialized singleton behind a reader-writer lock; registration
//! is idempotent on `(factory, metric)` pairs.

use super::{EvaluatorFactory, builtin};
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Once, RwLock};
use tracing::{debug, info, warn};

static REGISTRY: Lazy<RwLock<RegistryState>> = Lazy::new(|| RwLock::new(RegistryState::default()));
static INIT: Once = Once::new();

#[derive(Default)]
struct RegistryState {
    /// metric identifier -> factory names able to produce it
    metric_map: BTreeMap<String, BTreeSet<&'static str>>,
    /// factory name -> descriptor
    factories: BTreeMap<&'static str, EvaluatorFactory>,
}

/// Initializes the registry with the builtin evaluators
///
/// Idempotent: later calls are no-ops. Failures registering an individual
/// evaluator are logged and do not abort initialization.
pub fn initialize_registry() {
    INIT.call_once(|| {
        for factory in builtin::factories() {
            register_evaluator(factory);
        }
        let state = REGISTRY.read().expect("registry lock poisoned");
        info!(
            "Evaluator registry initialized with {} evaluators for {} metrics",
            state.factories.len(),
            state.metric_map.len()
        );
    });
}

/// Registers an evaluator factory for its declared metrics
///
/// Idempotent on `(factory, metric)` pairs: re-registering an already-known
/// factory does not duplicate dispatch.
pub fn register_evaluator(factory: EvaluatorFactory) {
    let mut state = REGISTRY.write().expect("registry lock poisoned");

    let already = state.factories.contains_key(factory.name)
        && factory.supported_metrics.iter().all(|metric| {
            state
                .metric_map
                .get(*metric)
                .is_some_and(|names| names.contains(factory.name))
        });
    if already {
        debug!("Evaluator '{}' already registered, skipping", factory.name);
        return;
    }

    state.factories.insert(factory.name, factory);
    for metric in factory.supported_metrics {
        let providers = state.metric_map.entry((*metric).to_string()).or_default();
        providers.insert(factory.name);
        if providers.len() > 1 {
            debug!("Multiple evaluators registered for metric '{metric}': {providers:?}");
        }
    }
    info!(
        "Registered evaluator '{}' for metrics: {:?}",
        factory.name, factory.supported_metrics
    );
}

/// Factories able to produce a specific metric
///
/// Falls back to a case-insensitive match, then to a deep scan of every
/// registered factory's declared metric set.
#[must_use]
pub fn evaluators_for_metric(metric: &str) -> Vec<EvaluatorFactory> {
    let state = REGISTRY.read().expect("registry lock poisoned");

    if let Some(names) = state.metric_map.get(metric) {
        if !names.is_empty() {
            return names
                .iter()
                .filter_map(|name| state.factories.get(name).copied())
                .collect();
        }
    }

    // case-insensitive fallback
    let lowered = metric.to_lowercase();
    for (key, names) in &state.metric_map {
        if key.to_lowercase() == lowered {
            debug!("Case-insensitive match for metric '{metric}' -> '{key}'");
            return names
                .iter()
                .filter_map(|name| state.factories.get(name).copied())
                .collect();
        }
    }

    // deep scan of declared metric sets
    for factory in state.factories.values() {
        if factory.supported_metrics.contains(&metric) {
            debug!(
                "Found evaluator '{}' supporting metric '{metric}' through deep scan",
                factory.name
            );
            return vec![*factory];
        }
    }

    warn!("No evaluators found for metric '{metric}'");
    Vec::new()
}

/// Factories whose supported-metric sets intersect the given metrics
///
/// When several evaluators declare the same metric, all are returned and the
/// caller decides which to run. The result is deduplicated by factory name
/// and deterministic.
#[must_use]
pub fn discover_for_metrics<S: AsRef<str>>(metrics: &[S]) -> Vec<EvaluatorFactory> {
    if metrics.is_empty() {
        warn!("No metrics provided to evaluator discovery");
        return Vec::new();
    }

    let mut discovered: BTreeMap<&'static str, EvaluatorFactory> = BTreeMap::new();
    for metric in metrics {
        for factory in evaluators_for_metric(metric.as_ref()) {
            discovered.entry(factory.name).or_insert(factory);
        }
    }

    let names: Vec<&str> = discovered.keys().copied().collect();
    info!(
        "Discovered {} evaluators for {} metrics: {names:?}",
        discovered.len(),
        metrics.len()
    );
    discovered.into_values().collect()
}

/// Every metric identifier any registered evaluator can produce
#[must_use]
pub fn all_metrics() -> BTreeSet<String> {
    let state = REGISTRY.read().expect("registry lock poisoned");
    state.metric_map.keys().cloned().collect()
}

/// Names of every registered evaluator
#[must_use]
pub fn all_evaluators() -> Vec<&'static str> {
    let state = REGISTRY.read().expect("registry lock poisoned");
    state.factories.keys().copied().collect()
}

/// Whether a factory with this name is registered
#[must_use]
pub fn is_registered(name: &str) -> bool {
    let state = REGISTRY.read().expect("registry lock poisoned");
    state.factories.contains_key(name)
}

/// Metrics a specific registered evaluator can produce
#[must_use]
pub fn metrics_for_evaluator(name: &str) -> BTreeSet<String> {
    let state = REGISTRY.read().expect("registry lock poisoned");
    state
        .metric_map
        .iter()
        .filter(|(_, names)| names.contains(name))
        .map(|(metric, _)| metric.clone())
        .collect()
}

/// Clears all registrations (test support)
pub fn clear_registry() {
    let mut state = REGISTRY.write().expect("registry lock poisoned");
    state.metric_map.clear();
    state.factories.clear();
}
