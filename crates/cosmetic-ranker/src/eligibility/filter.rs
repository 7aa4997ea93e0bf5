use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::{Candidate, CandidateId};
use crate::rules::{
    applicable_rules, evaluate_condition, EvaluationContext, MatchMode, Rule, RuleHit, RuleKind,
    RuleSnapshot, Scalar,
};

use super::summary::ExclusionSummary;

const DEFAULT_RATIONALE: &str = "safety concern";

/// Result of one eligibility pass. `kept` preserves input order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EligibilityOutcome {
    pub kept: Vec<Candidate>,
    pub excluded: BTreeMap<CandidateId, Vec<RuleHit>>,
    pub reasons: BTreeMap<CandidateId, Vec<String>>,
    pub total_evaluated: usize,
    /// Exclusions caused by real rules; `SYSTEM_ERROR` hits are not counted.
    pub rules_applied: usize,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl EligibilityOutcome {
    pub fn total_excluded(&self) -> usize {
        self.excluded.len()
    }

    pub fn is_excluded(&self, id: CandidateId) -> bool {
        self.excluded.contains_key(&id)
    }

    pub fn summary(&self) -> ExclusionSummary {
        ExclusionSummary::from_outcome(self)
    }

    fn exclude(&mut self, id: CandidateId, hit: RuleHit, reason: String) {
        self.excluded.entry(id).or_default().push(hit);
        self.reasons.entry(id).or_default().push(reason);
    }
}

/// Applies eligibility rules to a candidate batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct EligibilityFilter {
    mode: MatchMode,
}

impl EligibilityFilter {
    pub fn new(mode: MatchMode) -> Self {
        Self { mode }
    }

    /// Filters with the active eligibility rules of `snapshot`.
    pub fn with_snapshot(
        snapshot: &RuleSnapshot,
        candidates: Vec<Candidate>,
        resolved_codes: &BTreeSet<String>,
        context: &EvaluationContext,
    ) -> EligibilityOutcome {
        let rules: Vec<Rule> = snapshot
            .active_rules(RuleKind::Eligibility)
            .cloned()
            .collect();
        Self::new(snapshot.match_mode).filter(candidates, resolved_codes, &rules, context)
    }

    /// Splits `candidates` into kept and excluded. Only active eligibility rules in `rules`
    /// are considered.
    pub fn filter(
        &self,
        candidates: Vec<Candidate>,
        resolved_codes: &BTreeSet<String>,
        rules: &[Rule],
        context: &EvaluationContext,
    ) -> EligibilityOutcome {
        let started = Instant::now();
        let mut outcome = EligibilityOutcome {
            total_evaluated: candidates.len(),
            ..EligibilityOutcome::default()
        };
        if candidates.is_empty() {
            debug!("no candidates to evaluate");
            return outcome;
        }

        let eligibility: Vec<&Rule> = rules
            .iter()
            .filter(|rule| rule.active && rule.is_eligibility())
            .collect();
        let preg_lact = matches!(context.get("preg_lact"), Some(Scalar::Bool(true)));

        for candidate in candidates {
            let tags = candidate.canonical_tags();
            let applicable = applicable_rules(
                eligibility.iter().copied(),
                resolved_codes,
                &tags,
                self.mode,
            );

            let mut verdict = None;
            for rule in applicable {
                match evaluate_condition(&rule.condition, context) {
                    Ok(true) => {
                        verdict = Some((
                            RuleHit::from_rule(rule),
                            exclusion_reason(rule, preg_lact),
                        ));
                        outcome.rules_applied += 1;
                        break;
                    }
                    Ok(false) => {}
                    Err(err) => {
                        warn!(
                            candidate = %candidate.id,
                            rule = %rule.id,
                            error = %err,
                            "eligibility evaluation failed; excluding candidate"
                        );
                        verdict = Some((
                            RuleHit::system_error(&err),
                            "excluded as a precaution after a rule evaluation error".to_string(),
                        ));
                        break;
                    }
                }
            }

            match verdict {
                Some((hit, reason)) => {
                    debug!(candidate = %candidate.id, rule = %hit.rule_id, %reason, "candidate excluded");
                    outcome.exclude(candidate.id, hit, reason);
                }
                None => outcome.kept.push(candidate),
            }
        }

        outcome.elapsed = started.elapsed();
        info!(
            evaluated = outcome.total_evaluated,
            excluded = outcome.total_excluded(),
            rules_applied = outcome.rules_applied,
            elapsed_ms = outcome.elapsed.as_secs_f64() * 1000.0,
            "eligibility evaluated"
        );
        outcome
    }
}

/// Display name for well-known medication codes, the code itself otherwise.
pub fn medication_name(code: &str) -> &str {
    match code {
        "B01AA03" => "warfarin",
        "H02AB" => "steroid",
        "MULTI:ANTICOAG" => "anticoagulant",
        "MULTI:HTN" => "antihypertensive",
        other => other,
    }
}

/// Human-readable reason for an exclusion by `rule`.
pub fn exclusion_reason(rule: &Rule, preg_lact: bool) -> String {
    let rationale = if rule.rationale.trim().is_empty() {
        DEFAULT_RATIONALE
    } else {
        rule.rationale.trim()
    };
    if let Some(code) = &rule.medication_code {
        return format!("while taking {}: {rationale}", medication_name(code));
    }
    if let Some(tag) = &rule.ingredient_tag {
        return format!("contains {tag}: {rationale}");
    }
    if preg_lact {
        return format!("during pregnancy or lactation: {rationale}");
    }
    rationale.to_string()
}
