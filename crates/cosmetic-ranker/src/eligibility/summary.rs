use std::collections::BTreeMap;

use serde::Serialize;

use super::filter::EligibilityOutcome;

const TOP_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleCount {
    pub rule_id: String,
    pub count: usize,
}

/// Aggregate view of one eligibility pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExclusionSummary {
    pub total_evaluated: usize,
    pub total_excluded: usize,
    /// Percentage, two decimals.
    pub exclusion_rate: f64,
    pub rules_triggered: usize,
    pub top_rules: Vec<RuleCount>,
    pub reason_distribution: BTreeMap<String, usize>,
}

impl ExclusionSummary {
    pub fn from_outcome(outcome: &EligibilityOutcome) -> Self {
        if outcome.total_evaluated == 0 {
            return Self::default();
        }

        let mut by_rule: BTreeMap<&str, usize> = BTreeMap::new();
        for hit in outcome.excluded.values().flatten() {
            *by_rule.entry(hit.rule_id.as_str()).or_default() += 1;
        }
        let mut by_reason: BTreeMap<&str, usize> = BTreeMap::new();
        for reason in outcome.reasons.values().flatten() {
            *by_reason.entry(reason.as_str()).or_default() += 1;
        }

        let rate = outcome.total_excluded() as f64 / outcome.total_evaluated as f64 * 100.0;
        Self {
            total_evaluated: outcome.total_evaluated,
            total_excluded: outcome.total_excluded(),
            exclusion_rate: (rate * 100.0).round() / 100.0,
            rules_triggered: by_rule.len(),
            top_rules: most_common(&by_rule)
                .into_iter()
                .map(|(rule_id, count)| RuleCount {
                    rule_id: rule_id.to_string(),
                    count,
                })
                .collect(),
            reason_distribution: most_common(&by_reason)
                .into_iter()
                .map(|(reason, count)| (reason.to_string(), count))
                .collect(),
        }
    }
}

/// Highest counts first, ties by key; at most ten.
fn most_common<'a>(counts: &BTreeMap<&'a str, usize>) -> Vec<(&'a str, usize)> {
    let mut entries: Vec<(&str, usize)> = counts.iter().map(|(key, count)| (*key, *count)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    entries.truncate(TOP_LIMIT);
    entries
}
