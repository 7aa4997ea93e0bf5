use std::collections::BTreeSet;

use serde_json::Value;

use super::alias::{normalize_med_code, AliasTable};
use super::model::{
    Condition, MedicationAlias, Rule, RuleAction, RuleId, RuleKind, Scalar, Severity,
};
use super::source::{RuleDocument, RuleRecord};
use super::store::RuleError;
use super::validation::{validate_document, ValidationReport};

pub(crate) struct CompiledRules {
    pub(crate) version: String,
    pub(crate) rules: Vec<Rule>,
    pub(crate) aliases: AliasTable,
    pub(crate) report: ValidationReport,
}

/// Validates and converts a document. Any blocking issue rejects the whole document.
pub(crate) fn compile(document: RuleDocument) -> Result<CompiledRules, RuleError> {
    let report = validate_document(&document);
    if !report.valid {
        return Err(RuleError::Invalid(report));
    }

    let mut rules = Vec::with_capacity(document.rules.len());
    for record in &document.rules {
        rules.push(compile_record(record)?);
    }

    let aliases = AliasTable::new(document.aliases.iter().map(|alias| MedicationAlias {
        alias_code: alias.alias_code.clone(),
        resolved_codes: alias.resolved_codes.iter().cloned().collect::<BTreeSet<_>>(),
    }));

    Ok(CompiledRules {
        version: document.version,
        rules,
        aliases,
        report,
    })
}

fn compile_record(record: &RuleRecord) -> Result<Rule, RuleError> {
    let malformed = |reason: &str| RuleError::Malformed {
        rule_id: record.rule_id.clone().unwrap_or_default(),
        reason: reason.to_string(),
    };

    let id = normalized_text(record.rule_id.as_deref()).ok_or_else(|| malformed("missing id"))?;
    let kind = record
        .rule_type
        .as_deref()
        .and_then(RuleKind::parse)
        .ok_or_else(|| malformed("invalid rule_type"))?;
    let action = record
        .action
        .as_deref()
        .and_then(RuleAction::parse)
        .ok_or_else(|| malformed("invalid action"))?;
    let condition = match &record.condition_json {
        Some(value) => parse_condition(value).map_err(|reason| malformed(&reason))?,
        None => Condition::new(),
    };
    let weight = match kind {
        RuleKind::Eligibility => 0,
        RuleKind::Penalty => u32::try_from(record.weight.unwrap_or_default())
            .map_err(|_| malformed("weight out of range"))?,
    };

    Ok(Rule {
        id: RuleId(id),
        kind,
        medication_code: record
            .med_code
            .as_deref()
            .map(normalize_med_code)
            .filter(|code| !code.is_empty()),
        ingredient_tag: normalized_tag(record.ingredient_tag.as_deref()),
        condition,
        action,
        weight,
        severity: record.severity.as_deref().and_then(Severity::parse),
        rationale: record
            .rationale
            .clone()
            .unwrap_or_else(|| "safety concern".to_string()),
        citation: citation(record.citation_url.as_ref()),
        active: record.active.unwrap_or(true),
    })
}

pub(crate) fn normalized_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub(crate) fn normalized_tag(raw: Option<&str>) -> Option<String> {
    normalized_text(raw).map(|tag| tag.to_lowercase())
}

/// Accepts an object, a string containing an object, or null/empty for "always".
pub(crate) fn parse_condition(value: &Value) -> Result<Condition, String> {
    let object = match value {
        Value::Null => return Ok(Condition::new()),
        Value::String(raw) if raw.trim().is_empty() => return Ok(Condition::new()),
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err("condition_json must be an object".to_string()),
            Err(err) => return Err(format!("condition_json is not valid JSON: {err}")),
        },
        Value::Object(map) => map.clone(),
        _ => return Err("condition_json must be an object".to_string()),
    };

    let mut condition = Condition::new();
    for (key, value) in object {
        let scalar = match value {
            Value::Bool(flag) => Scalar::Bool(flag),
            Value::Number(number) => match number.as_f64() {
                Some(number) => Scalar::Number(number),
                None => return Err(format!("condition key '{key}' is not a finite number")),
            },
            Value::String(text) => Scalar::Text(text),
            _ => return Err(format!("condition key '{key}' must be a bool, number or string")),
        };
        condition.insert(key, scalar);
    }
    Ok(condition)
}

fn citation(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(url) => normalized_text(Some(url)),
        Value::Array(items) => items
            .first()
            .and_then(Value::as_str)
            .and_then(|url| normalized_text(Some(url))),
        _ => None,
    }
}
