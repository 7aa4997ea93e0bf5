use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::{Candidate, CandidateId};
use crate::rules::{Condition, Rule, RuleAction, RuleId, RuleKind, Scalar};

pub(super) fn candidate(id: u64, tags: &[&str]) -> Candidate {
    Candidate {
        id: CandidateId(id),
        name: format!("Product {id}"),
        brand: "Innisfree".to_string(),
        category: "serum".to_string(),
        tags: tags.iter().map(|tag| tag.to_string()).collect(),
        attributes: BTreeMap::new(),
    }
}

pub(super) fn exclusion(
    id: &str,
    med: Option<&str>,
    tag: Option<&str>,
    condition: &[(&str, Scalar)],
) -> Rule {
    Rule {
        id: RuleId::new(id),
        kind: RuleKind::Eligibility,
        medication_code: med.map(str::to_string),
        ingredient_tag: tag.map(str::to_string),
        condition: condition
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect::<Condition>(),
        action: RuleAction::Exclude,
        weight: 0,
        severity: None,
        rationale: "bleeding risk".to_string(),
        citation: None,
        active: true,
    }
}

/// ELG_001 from the bundled ruleset: warfarin with AHA in leave-on use.
pub(super) fn warfarin_aha() -> Rule {
    exclusion(
        "ELG_001",
        Some("B01AA03"),
        Some("aha"),
        &[("leave_on", Scalar::Bool(true))],
    )
}

pub(super) fn codes(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|value| value.to_string()).collect()
}
