use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{Candidate, CandidateId};
use crate::eligibility::RuleCount;
use crate::rules::{
    evaluate_condition, ConditionError, EvaluationContext, Rule, RuleHit, RuleKind, RuleSnapshot,
};

/// Summed penalty of one rule group never exceeds this.
pub const MAX_GROUP_PENALTY: u32 = 50;
/// Cap on a candidate's total penalty.
pub const MAX_TOTAL_PENALTY: u32 = 100;

const HIGH_RISK_GROUPS: [&str; 2] = ["anticoagulant", "steroid"];
const MEDIUM_RISK_GROUPS: [&str; 2] = ["exfoliant", "retinoid"];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("penalty rule {rule_id} could not be evaluated: {source}")]
pub struct PenaltyError {
    pub rule_id: String,
    #[source]
    pub source: ConditionError,
}

/// Risk level of a combination of rule groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PenaltySeverity {
    #[default]
    Low,
    Medium,
    High,
}

impl PenaltySeverity {
    pub fn from_groups(groups: &BTreeSet<String>) -> Self {
        let high = groups
            .iter()
            .filter(|group| HIGH_RISK_GROUPS.contains(&group.as_str()))
            .count();
        let medium = groups
            .iter()
            .filter(|group| MEDIUM_RISK_GROUPS.contains(&group.as_str()))
            .count();
        if high >= 2 || (high >= 1 && medium >= 1) {
            PenaltySeverity::High
        } else if high == 1 || medium >= 2 {
            PenaltySeverity::Medium
        } else {
            PenaltySeverity::Low
        }
    }

    pub fn multiplier(self) -> f64 {
        match self {
            PenaltySeverity::Low => 1.0,
            PenaltySeverity::Medium => 1.5,
            PenaltySeverity::High => 2.0,
        }
    }
}

/// Related rules share a group so stacking them is capped.
pub fn rule_group(rule: &Rule) -> String {
    if let Some(code) = &rule.medication_code {
        if code.starts_with("B01") {
            return "anticoagulant".to_string();
        }
        if code.starts_with("H02") {
            return "steroid".to_string();
        }
        if let Some(class) = code.strip_prefix("MULTI:") {
            return class.to_lowercase();
        }
        return format!("med_{}", code.chars().take(3).collect::<String>());
    }
    if let Some(tag) = &rule.ingredient_tag {
        let tag = tag.to_lowercase();
        if tag.contains("aha") || tag.contains("bha") {
            return "exfoliant".to_string();
        }
        if tag.contains("retinoid") || tag.contains("retinol") {
            return "retinoid".to_string();
        }
        if tag.contains("vitamin_c") {
            return "vitamin_c".to_string();
        }
        return format!("ingredient_{tag}");
    }
    "default".to_string()
}

/// Penalty rules that matched one candidate and the resulting deduction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PenaltyAssessment {
    pub hits: Vec<RuleHit>,
    pub groups: BTreeSet<String>,
    /// Sum of matched weights before caps and multipliers.
    pub raw_penalty: u64,
    pub severity: PenaltySeverity,
    pub multiplier: f64,
    /// Deduction applied to the safety score, at most [`MAX_TOTAL_PENALTY`].
    pub penalty: u32,
}

impl PenaltyAssessment {
    pub fn none() -> Self {
        Self {
            multiplier: 1.0,
            ..Self::default()
        }
    }

    pub fn hit_count(&self) -> usize {
        self.hits.len()
    }
}

/// Evaluates the active penalty rules of `snapshot` against one candidate.
///
/// Each group's summed weight is scaled down proportionally to [`MAX_GROUP_PENALTY`], the
/// total is multiplied by the severity of the group combination and capped at
/// [`MAX_TOTAL_PENALTY`]. An evaluation error aborts the assessment.
pub fn assess_penalties(
    snapshot: &RuleSnapshot,
    candidate: &Candidate,
    resolved_codes: &BTreeSet<String>,
    context: &EvaluationContext,
) -> Result<PenaltyAssessment, PenaltyError> {
    let tags = candidate.canonical_tags();
    let mut grouped: BTreeMap<String, Vec<&Rule>> = BTreeMap::new();
    for rule in snapshot.applicable(RuleKind::Penalty, resolved_codes, &tags) {
        let matched = evaluate_condition(&rule.condition, context).map_err(|source| {
            PenaltyError {
                rule_id: rule.id.to_string(),
                source,
            }
        })?;
        if matched {
            grouped.entry(rule_group(rule)).or_default().push(rule);
        }
    }

    let mut assessment = PenaltyAssessment::none();
    let mut capped_total = 0u64;
    for (group, rules) in &grouped {
        let group_total: u64 = rules.iter().map(|rule| u64::from(rule.weight)).sum();
        let factor = if group_total > u64::from(MAX_GROUP_PENALTY) {
            debug!(candidate = %candidate.id, group, group_total, "group penalty capped");
            f64::from(MAX_GROUP_PENALTY) / group_total as f64
        } else {
            1.0
        };
        for rule in rules {
            capped_total += (f64::from(rule.weight) * factor) as u64;
            assessment.hits.push(RuleHit::from_rule(rule));
        }
        assessment.raw_penalty = assessment.raw_penalty.saturating_add(group_total);
    }
    assessment.groups = grouped.into_keys().collect();
    assessment.severity = PenaltySeverity::from_groups(&assessment.groups);
    assessment.multiplier = assessment.severity.multiplier();
    assessment.penalty =
        ((capped_total as f64 * assessment.multiplier) as u32).min(MAX_TOTAL_PENALTY);
    Ok(assessment)
}

/// Batch view of penalty assessments.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PenaltyStatistics {
    pub total_candidates: usize,
    pub penalized: usize,
    /// Percentage, two decimals.
    pub penalization_rate: f64,
    pub average_penalty: f64,
    pub distribution: BTreeMap<String, usize>,
    pub top_rules: Vec<RuleCount>,
}

impl PenaltyStatistics {
    pub fn collect<'a>(
        assessments: impl IntoIterator<Item = (CandidateId, &'a PenaltyAssessment)>,
    ) -> Self {
        let mut stats = Self::default();
        for bucket in ["0", "1-10", "11-25", "26-50", "51+"] {
            stats.distribution.insert(bucket.to_string(), 0);
        }
        let mut total_penalty = 0u64;
        let mut by_rule: BTreeMap<String, usize> = BTreeMap::new();
        for (_, assessment) in assessments {
            stats.total_candidates += 1;
            total_penalty += u64::from(assessment.penalty);
            if assessment.penalty > 0 {
                stats.penalized += 1;
            }
            let bucket = match assessment.penalty {
                0 => "0",
                1..=10 => "1-10",
                11..=25 => "11-25",
                26..=50 => "26-50",
                _ => "51+",
            };
            *stats.distribution.entry(bucket.to_string()).or_default() += 1;
            for hit in &assessment.hits {
                *by_rule.entry(hit.rule_id.to_string()).or_default() += 1;
            }
        }
        if stats.total_candidates == 0 {
            return stats;
        }

        let total = stats.total_candidates as f64;
        stats.penalization_rate = round2(stats.penalized as f64 / total * 100.0);
        stats.average_penalty = round2(total_penalty as f64 / total);
        let mut top: Vec<RuleCount> = by_rule
            .into_iter()
            .map(|(rule_id, count)| RuleCount { rule_id, count })
            .collect();
        top.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.rule_id.cmp(&b.rule_id)));
        top.truncate(10);
        stats.top_rules = top;
        stats
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
