use crate::scoring::{
    clamp_score, normalize_final_scores, ScoreBreakdown, ScoreWeights, NEUTRAL_SCORE,
};

#[test]
fn final_score_is_the_weighted_mean() {
    let breakdown = ScoreBreakdown::new(80.0, 60.0, 40.0, &ScoreWeights::default());

    assert!((breakdown.final_score - 60.0).abs() < 1e-9);
    assert_eq!(breakdown.intent_weight, 30.0);
    assert_eq!(breakdown.personalization_weight, 40.0);
    assert_eq!(breakdown.safety_weight, 30.0);
    assert!(!breakdown.normalized);
}

#[test]
fn zero_weights_score_neutral() {
    let weights = ScoreWeights {
        intent: 0.0,
        personalization: 0.0,
        safety: 0.0,
    };

    let breakdown = ScoreBreakdown::new(95.0, 10.0, 70.0, &weights);

    assert_eq!(breakdown.final_score, NEUTRAL_SCORE);
    assert_eq!(breakdown.intent_score, 95.0);
}

#[test]
fn dimension_scores_are_clamped() {
    let breakdown = ScoreBreakdown::new(150.0, -20.0, f64::NAN, &ScoreWeights::default());

    assert_eq!(breakdown.intent_score, 100.0);
    assert_eq!(breakdown.personalization_score, 0.0);
    assert_eq!(breakdown.safety_score, NEUTRAL_SCORE);
    assert!((0.0..=100.0).contains(&breakdown.final_score));
    assert_eq!(clamp_score(-0.5), 0.0);
}

#[test]
fn neutral_breakdown_is_fifty_everywhere() {
    let breakdown = ScoreBreakdown::neutral(&ScoreWeights {
        intent: 1.0,
        personalization: 0.0,
        safety: 0.0,
    });

    assert_eq!(breakdown.intent_score, NEUTRAL_SCORE);
    assert_eq!(breakdown.safety_score, NEUTRAL_SCORE);
    assert_eq!(breakdown.final_score, NEUTRAL_SCORE);
}

#[test]
fn normalization_spans_the_full_range() {
    let weights = ScoreWeights::default();
    let mut batch = vec![
        ScoreBreakdown::new(40.0, 40.0, 40.0, &weights),
        ScoreBreakdown::new(60.0, 60.0, 60.0, &weights),
        ScoreBreakdown::new(80.0, 80.0, 80.0, &weights),
    ];

    normalize_final_scores(batch.iter_mut());

    let finals: Vec<f64> = batch.iter().map(|b| b.final_score.round()).collect();
    assert_eq!(finals, vec![0.0, 50.0, 100.0]);
    assert!(batch.iter().all(|b| b.normalized));
}

#[test]
fn normalization_leaves_flat_batches_alone() {
    let weights = ScoreWeights::default();
    let mut batch = vec![
        ScoreBreakdown::new(70.0, 70.0, 70.0, &weights),
        ScoreBreakdown::new(70.0, 70.0, 70.0, &weights),
    ];

    normalize_final_scores(batch.iter_mut());

    assert!(batch.iter().all(|b| !b.normalized));
    assert!(batch.iter().all(|b| (b.final_score - 70.0).abs() < 1e-9));
}

#[test]
fn negative_weights_are_rejected() {
    let weights = ScoreWeights {
        safety: -1.0,
        ..ScoreWeights::default()
    };

    let err = weights.validate().expect_err("negative weight");

    assert!(err.contains("safety"), "{err}");
    assert!(ScoreWeights::default().validate().is_ok());
}
