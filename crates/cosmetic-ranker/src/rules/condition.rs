use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::model::{Condition, Scalar};

/// How the product will be used. Feeds rule conditions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageContext {
    pub leave_on: bool,
    pub day_use: bool,
    pub face: bool,
    pub large_area_hint: bool,
}

/// Values a rule condition is compared against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvaluationContext {
    values: BTreeMap<String, Scalar>,
}

impl EvaluationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_usage(usage: &UsageContext, preg_lact: bool) -> Self {
        Self::new()
            .with("leave_on", usage.leave_on)
            .with("day_use", usage.day_use)
            .with("face", usage.face)
            .with("large_area_hint", usage.large_area_hint)
            .with("preg_lact", preg_lact)
    }

    pub fn with(mut self, key: &str, value: impl Into<Scalar>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Scalar>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.values.get(key)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConditionError {
    #[error("condition key '{key}' expects a {expected} but context holds a {found}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// AND over every key of `condition`.
///
/// A missing context key reads as `false` for boolean operands and as a mismatch otherwise.
/// Operands of different scalar kinds are an error rather than a silent mismatch.
pub fn evaluate_condition(
    condition: &Condition,
    context: &EvaluationContext,
) -> Result<bool, ConditionError> {
    for (key, expected) in condition {
        let matched = match (expected, context.get(key)) {
            (Scalar::Bool(expected), None) => !*expected,
            (_, None) => false,
            (Scalar::Bool(expected), Some(Scalar::Bool(actual))) => expected == actual,
            (Scalar::Number(expected), Some(Scalar::Number(actual))) => {
                (expected - actual).abs() < f64::EPSILON
            }
            (Scalar::Text(expected), Some(Scalar::Text(actual))) => expected == actual,
            (expected, Some(actual)) => {
                return Err(ConditionError::TypeMismatch {
                    key: key.clone(),
                    expected: expected.kind(),
                    found: actual.kind(),
                })
            }
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}
