//! Metric value types shared between evaluators and the decision engine

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// A quantitative or boolean signal about an AI interaction trace
///
/// Metrics are keyed by dotted identifiers such as
/// `fairness.counterfactual_score` and flow from evaluators into the
/// decision engine's input document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricValue {
    /// Dotted metric identifier
    pub name: String,
    /// Human-readable name
    pub display_name: String,
    /// Metric value (scalar or small structured value)
    pub value: Value,
    /// Whether the associated control passed, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_passed: Option<bool>,
    /// Threshold the value was compared against, when applicable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    /// Category tag used for report grouping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl MetricValue {
    /// Creates a metric with just an identifier, display name, and value
    #[must_use]
    pub fn new<S: Into<String>>(name: S, display_name: S, value: Value) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            value,
            control_passed: None,
            threshold: None,
            category: None,
        }
    }

    /// Sets the control outcome
    #[must_use]
    pub const fn with_control_passed(mut self, passed: bool) -> Self {
        self.control_passed = Some(passed);
        self
    }

    /// Sets the threshold
    #[must_use]
    pub const fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

/// Metric evidence attached to a policy decision
///
/// This is the `{control_passed, name, value}` triple the decision engine
/// emits per metric inside a compliance report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEvidence {
    /// Whether this control passed validation
    pub control_passed: bool,
    /// Display name of the metric
    pub name: String,
    /// Value of the metric
    pub value: Value,
}

/// Scalar default value declared by a policy parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean parameter
    Bool(bool),
    /// Whole-number parameter
    Integer(i64),
    /// Floating-point parameter
    Float(f64),
    /// String parameter
    String(String),
}

impl ParamValue {
    /// Parses a declared default literal
    ///
    /// Case-insensitive `true`/`false` become booleans, whole numbers become
    /// integers, fractional numbers become floats, quoted strings are
    /// unquoted, and anything else is kept as a string verbatim.
    #[must_use]
    pub fn parse_literal(literal: &str) -> Self {
        let trimmed = literal.trim();
        if trimmed.eq_ignore_ascii_case("true") {
            return Self::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Self::Bool(false);
        }
        if let Ok(value) = trimmed.parse::<f64>() {
            if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
                return Self::Integer(value as i64);
            }
            return Self::Float(value);
        }
        let unquoted = trimmed
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .or_else(|| trimmed.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')));
        Self::String(unquoted.unwrap_or(trimmed).to_string())
    }
}

impl Display for ParamValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<ParamValue> for Value {
    fn from(param: ParamValue) -> Self {
        match param {
            ParamValue::Bool(b) => Self::Bool(b),
            ParamValue::Integer(i) => Self::from(i),
            ParamValue::Float(v) => serde_json::Number::from_f64(v)
                .map_or(Self::Null, Self::Number),
            ParamValue::String(s) => Self::String(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_literal_booleans() {
        assert_eq!(ParamValue::parse_literal("true"), ParamValue::Bool(true));
        assert_eq!(ParamValue::parse_literal("FALSE"), ParamValue::Bool(false));
        assert_eq!(ParamValue::parse_literal("True"), ParamValue::Bool(true));
    }

    #[test]
    fn test_parse_literal_numbers() {
        assert_eq!(ParamValue::parse_literal("42"), ParamValue::Integer(42));
        assert_eq!(ParamValue::parse_literal("-3"), ParamValue::Integer(-3));
        assert_eq!(ParamValue::parse_literal("0.7"), ParamValue::Float(0.7));
        // Whole-valued decimals collapse to integers
        assert_eq!(ParamValue::parse_literal("2.0"), ParamValue::Integer(2));
    }

    #[test]
    fn test_parse_literal_strings() {
        assert_eq!(
            ParamValue::parse_literal("\"gpt-4o-mini\""),
            ParamValue::String("gpt-4o-mini".to_string())
        );
        assert_eq!(
            ParamValue::parse_literal("'single'"),
            ParamValue::String("single".to_string())
        );
        assert_eq!(
            ParamValue::parse_literal("bare_string"),
            ParamValue::String("bare_string".to_string())
        );
    }

    #[test]
    fn test_param_value_to_json() {
        assert_eq!(Value::from(ParamValue::Bool(true)), json!(true));
        assert_eq!(Value::from(ParamValue::Integer(7)), json!(7));
        assert_eq!(Value::from(ParamValue::Float(0.5)), json!(0.5));
        assert_eq!(
            Value::from(ParamValue::String("x".to_string())),
            json!("x")
        );
    }

    #[test]
    fn test_metric_value_builders() {
        let metric = MetricValue::new("toxicity.score", "Toxicity Score", json!(0.02))
            .with_control_passed(true)
            .with_threshold(0.1);
        assert_eq!(metric.control_passed, Some(true));
        assert_eq!(metric.threshold, Some(0.1));
    }
}
