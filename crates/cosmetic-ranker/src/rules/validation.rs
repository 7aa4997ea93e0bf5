use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::alias::normalize_med_code;
use super::loader::{normalized_tag, normalized_text, parse_condition};
use super::model::{RuleAction, RuleKind, Severity};
use super::source::RuleDocument;

const MAX_RULES_PER_CODE: usize = 5;
const MAX_RULES_PER_TAG: usize = 3;

/// Outcome of a ruleset check. `issues` block loading, `warnings` do not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn summary(&self) -> String {
        if self.valid {
            format!("valid with {} warning(s)", self.warnings.len())
        } else {
            format!(
                "{} issue(s), first: {}",
                self.issues.len(),
                self.issues.first().map(String::as_str).unwrap_or("unknown")
            )
        }
    }
}

pub fn validate_document(document: &RuleDocument) -> ValidationReport {
    let mut issues = Vec::new();
    let mut warnings = Vec::new();

    if document.rules.is_empty() {
        issues.push("ruleset contains no rules".to_string());
    }

    let mut seen = BTreeSet::new();
    let mut per_code: BTreeMap<String, usize> = BTreeMap::new();
    let mut per_tag: BTreeMap<String, usize> = BTreeMap::new();

    for (index, record) in document.rules.iter().enumerate() {
        let id = normalized_text(record.rule_id.as_deref());
        let label = id.clone().unwrap_or_else(|| format!("#{}", index + 1));

        match &id {
            None => issues.push(format!("rule {label}: missing rule_id")),
            Some(id) if !seen.insert(id.clone()) => {
                issues.push(format!("duplicate rule_id '{id}'"))
            }
            Some(_) => {}
        }

        let kind = match record.rule_type.as_deref().map(str::trim) {
            None | Some("") => {
                issues.push(format!("rule {label}: missing rule_type"));
                None
            }
            Some(raw) => {
                let kind = RuleKind::parse(raw);
                if kind.is_none() {
                    issues.push(format!("rule {label}: invalid rule_type '{raw}'"));
                }
                kind
            }
        };

        match record.action.as_deref().map(str::trim) {
            None | Some("") => issues.push(format!("rule {label}: missing action")),
            Some(raw) => match (RuleAction::parse(raw), kind) {
                (None, _) => issues.push(format!("rule {label}: invalid action '{raw}'")),
                (Some(action), Some(kind)) if action != kind.expected_action() => {
                    issues.push(format!(
                        "rule {label}: action '{raw}' is inconsistent with {} rules",
                        kind.label()
                    ))
                }
                _ => {}
            },
        }

        let code = record
            .med_code
            .as_deref()
            .map(normalize_med_code)
            .filter(|code| !code.is_empty());
        let tag = normalized_tag(record.ingredient_tag.as_deref());
        if code.is_none() && tag.is_none() {
            issues.push(format!(
                "rule {label}: needs a med_code or an ingredient_tag"
            ));
        }

        match kind {
            Some(RuleKind::Penalty) => {
                if record.weight.unwrap_or_default() <= 0 {
                    issues.push(format!("rule {label}: penalty weight must be positive"));
                } else if record.weight.unwrap_or_default() > i64::from(u32::MAX) {
                    issues.push(format!("rule {label}: penalty weight out of range"));
                }
            }
            Some(RuleKind::Eligibility) => {
                if record.weight.unwrap_or_default() != 0 {
                    warnings.push(format!(
                        "rule {label}: eligibility weight is ignored and stored as 0"
                    ));
                }
            }
            None => {}
        }

        if let Some(condition) = &record.condition_json {
            if let Err(reason) = parse_condition(condition) {
                issues.push(format!("rule {label}: {reason}"));
            }
        }

        if let Some(raw) = record.severity.as_deref() {
            if Severity::parse(raw).is_none() {
                warnings.push(format!("rule {label}: unknown severity '{raw}' ignored"));
            }
        }

        if let Some(code) = code {
            *per_code.entry(code).or_default() += 1;
        }
        if let Some(tag) = tag {
            *per_tag.entry(tag).or_default() += 1;
        }
    }

    for (code, count) in per_code {
        if count > MAX_RULES_PER_CODE {
            warnings.push(format!("medication code '{code}' has {count} rules"));
        }
    }
    for (tag, count) in per_tag {
        if count > MAX_RULES_PER_TAG {
            warnings.push(format!("ingredient tag '{tag}' has {count} rules"));
        }
    }

    for alias in &document.aliases {
        if alias.resolved_codes.is_empty() {
            warnings.push(format!(
                "alias '{}' resolves to no codes",
                alias.alias_code
            ));
        }
    }

    ValidationReport {
        valid: issues.is_empty(),
        issues,
        warnings,
    }
}

/// Counts describing the loaded ruleset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleStatistics {
    pub version: String,
    pub loaded_at: DateTime<Utc>,
    pub total_rules: usize,
    pub active_rules: usize,
    pub eligibility_rules: usize,
    pub penalty_rules: usize,
    pub aliases: usize,
}
