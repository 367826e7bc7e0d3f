//! Attest Core Library
//!
//! This library provides the core functionality for Attest AI compliance
//! auditing: a versioned policy library, metric evaluators with a
//! process-wide registry, an OPA decision engine driver, and the
//! orchestrator that ties a contract evaluation together.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use attest_core::models::{ContractBuilder, Interaction, ModelInfo};
//! use attest_core::orchestrator::{ComplianceOrchestrator, EvaluationOptions};
//!
//! # async fn run() -> attest_core::Result<()> {
//! let contract = ContractBuilder::new()
//!     .application_name("HealthcareGPT")
//!     .model_info(ModelInfo::new("gpt-4o-mini"))
//!     .interaction(Interaction::new("question", "answer"))
//!     .build()?;
//!
//! let orchestrator = ComplianceOrchestrator::from_library_root("policies")?;
//! let outcome = orchestrator
//!     .evaluate_by_category(&contract, "eu_ai_act", &EvaluationOptions::default())
//!     .await?;
//! println!("compliant: {}", outcome.overall_passed);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`] - Contract, metric, and report data models
//! - [`policy`] - Policy library, metadata parsing, dependency resolution
//! - [`evaluator`] - Evaluator trait, registry, and dispatch
//! - [`engine`] - OPA decision engine driver (embedded and remote)
//! - [`extraction`] - Decision document extraction
//! - [`orchestrator`] - Contract-level evaluation entry points
//! - [`reports`] - Report assembly and persistence
//! - [`config`] - Configuration management
//! - [`error`] - Unified error types
//! - [`logging`] - Tracing initialization

pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod extraction;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod policy;
pub mod reports;

// Re-exports for convenience
pub use error::{Error, Result};

/// Prelude module for commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::engine::{ExecutionMode, OpaEvaluator};
    pub use crate::error::{Error, Result};
    pub use crate::evaluator::{
        Evaluator, EvaluatorFactory, EvaluatorOutput, dispatch_evaluators, discover_for_metrics,
        initialize_registry, register_evaluator,
    };
    pub use crate::extraction::{extract_all_policy_results, validate_decision};
    pub use crate::logging::{init_default_tracing, init_tracing};
    pub use crate::models::{
        Contract, ContractBuilder, EvaluationReport, Interaction, MetricValue, ModelInfo,
        PolicyResult, load_contract, save_contract, validate_contract,
    };
    pub use crate::orchestrator::{
        ComplianceOrchestrator, EvaluationOptions, EvaluationOutcome, open_cached_library,
    };
    pub use crate::policy::{Category, Policy, PolicyError, PolicyLibrary};
    pub use crate::reports::{ReportFormat, build_report, save_reports};
}
