//! Data models for Attest Core

pub mod contract;
pub mod evaluation;
pub mod report;

pub use contract::{
    Contract, ContractBuilder, Interaction, ModelInfo, load_contract, save_contract,
    validate_contract,
};
pub use evaluation::{MetricEvidence, MetricValue, ParamValue};
pub use report::{
    ApplicationDetails, EvaluationReport, MetricGroup, PolicyResult, create_metric_group,
};
