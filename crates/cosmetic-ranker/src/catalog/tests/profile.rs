use super::common::*;
use crate::catalog::domain::{CandidateId, IngredientAnalysis, MatchLevel, UserProfile};
use crate::catalog::ProfileMatcher;

#[test]
fn baseline_safety_deducts_effects_warnings_and_allergies() {
    let analysis = irritating_analysis();
    // 80 - (70 + 60) * 0.1 - 5 - 8
    let expected = 80.0 - 13.0 - 5.0 - 8.0;
    assert!((analysis.baseline_safety() - expected).abs() < 1e-9);
}

#[test]
fn baseline_safety_is_clamped_at_zero() {
    let mut analysis = irritating_analysis();
    analysis.allergy_risks = vec!["a".to_string(); 20];
    assert_eq!(analysis.baseline_safety(), 0.0);
}

#[test]
fn missing_profile_fields_fall_back_to_neutral() {
    let matcher = ProfileMatcher::new();
    let result = matcher.evaluate(
        &serum(),
        &IngredientAnalysis::empty(CandidateId(42)),
        &UserProfile::default(),
    );

    assert_eq!(result.age_score, 50.0);
    assert_eq!(result.skin_type_score, 50.0);
    assert_eq!(result.preference_score, 50.0);
    assert!((result.overall_score - 50.0).abs() < 1e-9);
    assert_eq!(result.match_level(), MatchLevel::Fair);
    assert!(result
        .mismatch_reasons
        .iter()
        .any(|reason| reason.contains("age group not provided")));
}

#[test]
fn hydrating_serum_suits_dry_skin_better_than_irritant() {
    let matcher = ProfileMatcher::new();
    let profile = dry_thirties();

    let good = matcher.evaluate(&serum(), &hydrating_analysis(), &profile);
    let bad = matcher.evaluate(&serum(), &irritating_analysis(), &profile);

    assert!(good.skin_type_score > 60.0, "got {}", good.skin_type_score);
    assert!(bad.skin_type_score < good.skin_type_score);
    assert!(good.overall_score > bad.overall_score);
    assert!(!bad.mismatch_reasons.is_empty());
    assert!(good.reasons.len() <= 3);
}

#[test]
fn preferred_brand_and_category_raise_preference_score() {
    let matcher = ProfileMatcher::new();
    let mut profile = dry_thirties();
    profile.preferences.preferred_brands = vec!["avene".to_string()];
    profile.preferences.preferred_categories = vec!["Serum".to_string()];

    let result = matcher.evaluate(&serum(), &hydrating_analysis(), &profile);

    assert_eq!(result.preference_score, 85.0);
    assert!(result
        .reasons
        .iter()
        .any(|reason| reason.starts_with("[preference]")));
}

#[test]
fn unknown_skin_type_is_reported_as_mismatch() {
    let matcher = ProfileMatcher::new();
    let profile = UserProfile {
        skin_type: Some("scaly".to_string()),
        ..UserProfile::default()
    };

    let result = matcher.evaluate(&serum(), &hydrating_analysis(), &profile);

    assert_eq!(result.skin_type_score, 50.0);
    assert!(result
        .mismatch_reasons
        .iter()
        .any(|reason| reason.contains("unknown skin type 'scaly'")));
}

#[test]
fn match_levels_follow_thresholds() {
    assert_eq!(MatchLevel::from_score(95.0), MatchLevel::Excellent);
    assert_eq!(MatchLevel::from_score(70.0), MatchLevel::Good);
    assert_eq!(MatchLevel::from_score(50.0), MatchLevel::Fair);
    assert_eq!(MatchLevel::from_score(49.9), MatchLevel::Poor);
    assert_eq!(MatchLevel::Good.label(), "good");
}
