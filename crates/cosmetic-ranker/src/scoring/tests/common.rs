use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use serde_json::Value;

use crate::catalog::{Candidate, CandidateId, UserProfile};
use crate::rules::source::{builtin_document, RuleDocument, RuleRecord};
use crate::rules::{EvaluationContext, MatchMode, RuleSnapshot, UsageContext};
use crate::scoring::{ScoreWeights, ScoringContext, ScoringInput};

pub(super) fn candidate(id: u64, name: &str, tags: &[&str]) -> Candidate {
    Candidate {
        id: CandidateId(id),
        name: name.to_string(),
        brand: "Laneige".to_string(),
        category: "cream".to_string(),
        tags: tags.iter().map(|tag| tag.to_string()).collect(),
        attributes: BTreeMap::new(),
    }
}

pub(super) fn penalty(
    id: &str,
    med: Option<&str>,
    tag: Option<&str>,
    weight: i64,
    condition: Value,
) -> RuleRecord {
    RuleRecord {
        rule_id: Some(id.to_string()),
        rule_type: Some("penalty".to_string()),
        med_code: med.map(str::to_string),
        ingredient_tag: tag.map(str::to_string),
        condition_json: Some(condition),
        action: Some("penalize".to_string()),
        weight: Some(weight),
        severity: None,
        rationale: Some("irritation risk".to_string()),
        citation_url: None,
        active: Some(true),
    }
}

pub(super) fn snapshot(rules: Vec<RuleRecord>) -> Arc<RuleSnapshot> {
    let document = RuleDocument {
        version: "scoring-test".to_string(),
        rules,
        aliases: builtin_document().aliases,
    };
    Arc::new(RuleSnapshot::from_document(document, MatchMode::Any).expect("test ruleset compiles"))
}

pub(super) fn builtin_snapshot() -> Arc<RuleSnapshot> {
    Arc::new(
        RuleSnapshot::from_document(builtin_document(), MatchMode::Any)
            .expect("bundled ruleset compiles"),
    )
}

pub(super) fn codes(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|value| value.to_string()).collect()
}

pub(super) fn usage(day_use: bool) -> EvaluationContext {
    EvaluationContext::from_usage(
        &UsageContext {
            leave_on: true,
            day_use,
            ..UsageContext::default()
        },
        false,
    )
}

pub(super) fn context(
    snapshot: Arc<RuleSnapshot>,
    intents: &[&str],
    medications: &[&str],
) -> ScoringContext {
    ScoringContext {
        intent_tags: intents.iter().map(|intent| intent.to_string()).collect(),
        user_profile: UserProfile::default(),
        weights: ScoreWeights::default(),
        resolved_codes: codes(medications),
        evaluation: usage(false),
        snapshot,
    }
}

pub(super) fn input(candidates: Vec<Candidate>, context: ScoringContext) -> ScoringInput {
    ScoringInput {
        candidates,
        profile_matches: HashMap::new(),
        analyses: HashMap::new(),
        context,
        deadline: None,
    }
}
