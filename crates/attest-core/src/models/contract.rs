//! Contract models for AI compliance evaluation
//!
//! A contract is the input record describing an AI application and an
//! ordered set of its interactions, together with contextual metadata.
//! Contracts are immutable within one evaluation and serialize to JSON
//! with identifier fields rendered as strings.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{error, info};
use uuid::Uuid;

/// Context keys that must be present for known application domains
const DOMAIN_REQUIREMENTS: &[(&str, &[&str])] = &[
    ("healthcare", &["risk_documentation", "patient_data"]),
    ("finance", &["risk_documentation", "customer_data"]),
];

/// Information about the AI model being evaluated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Name of the AI model
    pub model_name: String,
    /// Optional version identifier for the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    /// Additional metadata about the model
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Optional model card with detailed documentation sections
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_card: Option<Map<String, Value>>,
}

impl ModelInfo {
    /// Creates model info with just a name
    #[must_use]
    pub fn new<S: Into<String>>(model_name: S) -> Self {
        Self {
            model_name: model_name.into(),
            model_version: None,
            metadata: Map::new(),
            model_card: None,
        }
    }
}

/// A single user-AI interaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    /// Unique identifier for the interaction
    #[serde(default = "Uuid::new_v4")]
    pub interaction_id: Uuid,
    /// Timestamp of the interaction (UTC)
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// The user's input to the AI system
    pub input_text: String,
    /// The AI system's response
    pub output_text: String,
    /// Additional metadata about the interaction
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Interaction {
    /// Creates an interaction from an input/output pair
    #[must_use]
    pub fn new<S: Into<String>>(input_text: S, output_text: S) -> Self {
        Self {
            interaction_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            input_text: input_text.into(),
            output_text: output_text.into(),
            metadata: Map::new(),
        }
    }
}

/// Contract for AI compliance evaluation
///
/// This is the interface through which external systems provide interaction
/// data for evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    /// Unique identifier for the contract
    #[serde(default = "Uuid::new_v4")]
    pub contract_id: Uuid,
    /// Name of the application being evaluated
    pub application_name: String,
    /// Information about the AI model
    pub model_info: ModelInfo,
    /// Ordered list of user-AI interactions
    pub interactions: Vec<Interaction>,
    /// Optional final output or summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_output: Option<String>,
    /// Additional context information (domain, deployment details, ...)
    #[serde(default)]
    pub context: Map<String, Value>,
    /// Compliance-specific context information
    #[serde(default)]
    pub compliance_context: Map<String, Value>,
}

impl Contract {
    /// Looks up a key in the context map, then the compliance context map
    #[must_use]
    pub fn context_value(&self, key: &str) -> Option<&Value> {
        self.context
            .get(key)
            .or_else(|| self.compliance_context.get(key))
    }

    /// Returns the declared application domain, if any
    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        self.context.get("domain").and_then(Value::as_str)
    }
}

/// Builder for [`Contract`]
#[derive(Debug, Default)]
pub struct ContractBuilder {
    application_name: Option<String>,
    model_info: Option<ModelInfo>,
    model_card: Option<Map<String, Value>>,
    interactions: Vec<Interaction>,
    final_output: Option<String>,
    context: Map<String, Value>,
    compliance_context: Map<String, Value>,
}

impl ContractBuilder {
    /// Creates a new contract builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the application name (required)
    #[must_use]
    pub fn application_name<S: Into<String>>(mut self, name: S) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Sets the model info (required)
    #[must_use]
    pub fn model_info(mut self, model_info: ModelInfo) -> Self {
        self.model_info = Some(model_info);
        self
    }

    /// Attaches a model card, merged into the model info on build
    #[must_use]
    pub fn model_card(mut self, model_card: Map<String, Value>) -> Self {
        self.model_card = Some(model_card);
        self
    }

    /// Appends an interaction
    #[must_use]
    pub fn interaction(mut self, interaction: Interaction) -> Self {
        self.interactions.push(interaction);
        self
    }

    /// Appends several interactions
    #[must_use]
    pub fn interactions<I: IntoIterator<Item = Interaction>>(mut self, interactions: I) -> Self {
        self.interactions.extend(interactions);
        self
    }

    /// Sets the final output text
    #[must_use]
    pub fn final_output<S: Into<String>>(mut self, output: S) -> Self {
        self.final_output = Some(output.into());
        self
    }

    /// Adds a context entry
    #[must_use]
    pub fn context_entry<S: Into<String>>(mut self, key: S, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Adds a compliance context entry
    #[must_use]
    pub fn compliance_context_entry<S: Into<String>>(mut self, key: S, value: Value) -> Self {
        self.compliance_context.insert(key.into(), value);
        self
    }

    /// Builds the contract, validating required fields and domain rules
    ///
    /// # Errors
    ///
    /// Returns `Error::Contract` if the application name is missing or empty,
    /// model info is missing, or domain-specific required context keys are
    /// absent.
    pub fn build(self) -> Result<Contract> {
        let application_name = self
            .application_name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::Contract("application name is required".to_string()))?;
        let mut model_info = self
            .model_info
            .ok_or_else(|| Error::Contract("model info is required".to_string()))?;

        if let Some(card) = self.model_card {
            model_info.model_card = Some(card);
        }

        let contract = Contract {
            contract_id: Uuid::new_v4(),
            application_name,
            model_info,
            interactions: self.interactions,
            final_output: self.final_output,
            context: self.context,
            compliance_context: self.compliance_context,
        };

        check_domain_requirements(&contract)?;
        Ok(contract)
    }
}

fn check_domain_requirements(contract: &Contract) -> Result<()> {
    let Some(domain) = contract.domain() else {
        return Ok(());
    };

    for (known_domain, required_keys) in DOMAIN_REQUIREMENTS {
        if domain == *known_domain {
            for key in *required_keys {
                if !contract.context.contains_key(*key) {
                    return Err(Error::Contract(format!(
                        "{domain} contracts must include {key}"
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Validates that a contract carries the fields required for evaluation
///
/// Returns `false` (with error logs) on an empty application name, an empty
/// interaction list, or missing domain-specific context keys.
#[must_use]
pub fn validate_contract(contract: &Contract) -> bool {
    if contract.application_name.is_empty() {
        error!("Contract validation failed: application name is empty");
        return false;
    }
    if contract.interactions.is_empty() {
        error!("Contract validation failed: no interactions provided");
        return false;
    }
    if let Err(e) = check_domain_requirements(contract) {
        error!("Contract validation failed: {e}");
        return false;
    }
    true
}

/// Saves a contract to a JSON file, creating parent directories as needed
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the file cannot
/// be written.
pub fn save_contract(contract: &Contract, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(contract)?;
    std::fs::write(path, json)?;
    info!("Contract saved to {}", path.display());
    Ok(())
}

/// Loads a contract from a JSON file
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not deserialize to a
/// valid contract.
pub fn load_contract(path: &Path) -> Result<Contract> {
    let content = std::fs::read_to_string(path)?;
    let contract: Contract = serde_json::from_str(&content)?;
    info!("Contract loaded from {}", path.display());
    Ok(contract)
}
