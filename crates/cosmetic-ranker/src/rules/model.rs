use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub String);

impl RuleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Eligibility,
    Penalty,
}

impl RuleKind {
    pub fn label(&self) -> &'static str {
        match self {
            RuleKind::Eligibility => "eligibility",
            RuleKind::Penalty => "penalty",
        }
    }

    /// `scoring` is the legacy name for penalty rules.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "eligibility" => Some(RuleKind::Eligibility),
            "penalty" | "scoring" => Some(RuleKind::Penalty),
            _ => None,
        }
    }

    pub fn expected_action(&self) -> RuleAction {
        match self {
            RuleKind::Eligibility => RuleAction::Exclude,
            RuleKind::Penalty => RuleAction::Penalize,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Exclude,
    Penalize,
}

impl RuleAction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "exclude" => Some(RuleAction::Exclude),
            "penalize" | "penalise" => Some(RuleAction::Penalize),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            _ => None,
        }
    }
}

/// Typed condition operand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Scalar {
    pub fn kind(&self) -> &'static str {
        match self {
            Scalar::Bool(_) => "bool",
            Scalar::Number(_) => "number",
            Scalar::Text(_) => "string",
        }
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Number(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Number(value as f64)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

/// Conjunction of key/value equalities. Empty means "always".
pub type Condition = BTreeMap<String, Scalar>;

/// Immutable, compiled rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub kind: RuleKind,
    pub medication_code: Option<String>,
    pub ingredient_tag: Option<String>,
    pub condition: Condition,
    pub action: RuleAction,
    pub weight: u32,
    pub severity: Option<Severity>,
    pub rationale: String,
    pub citation: Option<String>,
    pub active: bool,
}

impl Rule {
    pub fn is_eligibility(&self) -> bool {
        self.kind == RuleKind::Eligibility
    }

    pub fn is_penalty(&self) -> bool {
        self.kind == RuleKind::Penalty
    }
}

/// Expansion of a compound medication code into concrete codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationAlias {
    pub alias_code: String,
    pub resolved_codes: BTreeSet<String>,
}

/// Id of the synthetic hit recorded when rule evaluation itself fails.
pub const SYSTEM_ERROR_RULE: &str = "SYSTEM_ERROR";
/// Weight of the synthetic hit; dwarfs any real rule.
pub const SYSTEM_ERROR_WEIGHT: u32 = 1000;

/// A rule that matched a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleHit {
    pub rule_id: RuleId,
    pub kind: RuleKind,
    pub weight: u32,
    pub rationale: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation: Option<String>,
}

impl RuleHit {
    pub fn from_rule(rule: &Rule) -> Self {
        Self {
            rule_id: rule.id.clone(),
            kind: rule.kind,
            weight: rule.weight,
            rationale: rule.rationale.clone(),
            citation: rule.citation.clone(),
        }
    }

    pub fn system_error(detail: impl fmt::Display) -> Self {
        Self {
            rule_id: RuleId::new(SYSTEM_ERROR_RULE),
            kind: RuleKind::Eligibility,
            weight: SYSTEM_ERROR_WEIGHT,
            rationale: format!("excluded as a precaution, rule evaluation failed: {detail}"),
            citation: None,
        }
    }

    pub fn is_system_error(&self) -> bool {
        self.rule_id.as_str() == SYSTEM_ERROR_RULE
    }
}
