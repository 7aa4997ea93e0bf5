use super::common::*;
use crate::eligibility::{EligibilityFilter, ExclusionSummary, RuleCount};
use crate::rules::{EvaluationContext, Scalar};

#[test]
fn summary_counts_rules_and_reasons() {
    let rules = vec![
        exclusion("ELG_AHA", None, Some("aha"), &[]),
        exclusion("ELG_RET", None, Some("retinoid"), &[]),
        exclusion(
            "ELG_BAD",
            None,
            Some("bha"),
            &[("face", Scalar::Number(1.0))],
        ),
    ];
    let candidates = vec![
        candidate(1, &["aha"]),
        candidate(2, &["aha", "glycolic"]),
        candidate(3, &["retinoid"]),
        candidate(4, &["bha"]),
        candidate(5, &["ceramide"]),
        candidate(6, &[]),
        candidate(7, &[]),
        candidate(8, &[]),
    ];
    let context = EvaluationContext::new().with("face", true);

    let outcome = EligibilityFilter::default().filter(candidates, &codes(&[]), &rules, &context);
    let summary = outcome.summary();

    assert_eq!(summary.total_evaluated, 8);
    assert_eq!(summary.total_excluded, 4);
    assert_eq!(summary.exclusion_rate, 50.0);
    assert_eq!(summary.rules_triggered, 3);
    assert_eq!(
        summary.top_rules[0],
        RuleCount {
            rule_id: "ELG_AHA".to_string(),
            count: 2
        }
    );
    assert_eq!(summary.top_rules.len(), 3);
    assert_eq!(summary.reason_distribution["contains aha: bleeding risk"], 2);
}

#[test]
fn summary_rate_is_rounded_to_two_decimals() {
    let outcome = EligibilityFilter::default().filter(
        vec![candidate(1, &["aha"]), candidate(2, &[]), candidate(3, &[])],
        &codes(&[]),
        &[exclusion("ELG_AHA", None, Some("aha"), &[])],
        &EvaluationContext::new(),
    );

    assert_eq!(outcome.summary().exclusion_rate, 33.33);
}

#[test]
fn empty_outcome_has_empty_summary() {
    let outcome = EligibilityFilter::default().filter(
        Vec::new(),
        &codes(&[]),
        &[],
        &EvaluationContext::new(),
    );

    assert_eq!(outcome.summary(), ExclusionSummary::default());
}
