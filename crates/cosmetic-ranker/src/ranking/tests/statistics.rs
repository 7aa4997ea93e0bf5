use super::common::*;
use crate::ranking::{RankingConfig, RankingEngine, RankingStatistics};

#[test]
fn empty_ranking_has_empty_statistics() {
    assert_eq!(RankingStatistics::collect(&[]), RankingStatistics::default());
}

#[test]
fn statistics_bucket_scores_and_brands() {
    let engine = RankingEngine::new(RankingConfig {
        diversity: None,
        ..RankingConfig::default()
    });
    let batch = vec![
        scored(product(1, "Innisfree", "serum"), 95.0, 85.0),
        scored(product(2, "Innisfree", "cream"), 82.0, 65.0),
        penalized(scored(product(3, "Vichy", "serum"), 55.0, 30.0), 1, 30),
    ];

    let stats = engine.rank(&batch, &query(10)).statistics();

    assert_eq!(stats.total, 3);
    assert_eq!(stats.average_final_score, 77.3);
    assert_eq!(stats.average_intent_score, 60.0);
    assert_eq!(stats.score_distribution["90-100"], 1);
    assert_eq!(stats.score_distribution["80-89"], 1);
    assert_eq!(stats.score_distribution["<60"], 1);
    assert_eq!(stats.intent_distribution["80+"], 1);
    assert_eq!(stats.intent_distribution["<40"], 1);
    assert_eq!(stats.penalty_distribution["0"], 2);
    assert_eq!(stats.penalty_distribution["26+"], 1);
    assert_eq!(stats.top_brands[0].brand, "Innisfree");
    assert_eq!(stats.top_brands[0].count, 2);
    assert_eq!(stats.diversity.unique_brands, 2);
    assert_eq!(stats.diversity.unique_categories, 2);
    assert_eq!(stats.diversity.diversity_score, 0.67);
}
