use std::sync::Arc;

use super::common::*;
use crate::catalog::CandidateId;
use crate::pipeline::{PipelineConfig, PipelineError, RecommendationRequest, RecommendationService};
use crate::rules::{RuleStore, RuleStoreConfig};
use crate::scoring::ScoreWeights;

fn ids(response: &crate::pipeline::RecommendationResponse) -> Vec<u64> {
    response
        .recommendations
        .iter()
        .map(|item| item.candidate.id.0)
        .collect()
}

#[tokio::test]
async fn warfarin_excludes_leave_on_aha_and_penalizes_bha() {
    let service = plain_service();

    let response = service
        .recommend(request(&["moisturizing"], &["B01AA03"]))
        .await
        .expect("pipeline succeeds");

    assert_eq!(response.stats.total_candidates, 6);
    assert_eq!(response.stats.excluded_count, 1);
    assert_eq!(response.excluded[0].id, CandidateId(1));
    assert_eq!(response.excluded[0].rule_hits[0].rule_id.as_str(), "ELG_001");
    assert!(response.excluded[0].reasons[0].starts_with("while taking warfarin"));
    assert!(!ids(&response).contains(&1));
    assert_eq!(response.recommendations.len(), 5);

    let bha = response
        .recommendations
        .iter()
        .find(|item| item.candidate.id == CandidateId(2))
        .expect("bha toner kept");
    assert_eq!(bha.penalty_score, 22);
    assert_eq!(response.stats.penalized_count, 1);
    assert_eq!(response.stats.eligibility_rules_applied, 1);
    assert_eq!(response.stats.penalty_rules_applied, 1);
    assert_eq!(response.stats.ruleset_version, "builtin-1");

    let ranks: Vec<usize> = response.recommendations.iter().map(|item| item.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
    assert_eq!(response.recommendations[0].candidate.id, CandidateId(3));
}

#[tokio::test]
async fn rinse_off_use_keeps_the_aha_toner() {
    let service = plain_service();
    let mut request = request(&[], &["MULTI:ANTICOAG"]);
    request.usage.leave_on = false;

    let response = service.recommend(request).await.expect("pipeline succeeds");

    assert!(response.excluded.is_empty());
    assert_eq!(response.recommendations.len(), 6);
}

#[tokio::test]
async fn pregnancy_excludes_retinoids() {
    let service = plain_service();
    let mut request = request(&[], &[]);
    request.usage.leave_on = false;
    request.preg_lact = true;

    let response = service.recommend(request).await.expect("pipeline succeeds");

    assert_eq!(response.excluded.len(), 1);
    assert_eq!(response.excluded[0].id, CandidateId(6));
    assert_eq!(response.excluded[0].rule_hits[0].rule_id.as_str(), "ELG_002");
}

#[tokio::test]
async fn out_of_range_top_n_is_rejected() {
    let service = plain_service();

    for top_n in [0, 21] {
        let mut request = request(&[], &[]);
        request.top_n = top_n;
        match service.recommend(request).await {
            Err(PipelineError::Validation(message)) => assert!(message.contains("top_n")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }
    assert_eq!(service.stats().failures, 2);
}

#[tokio::test]
async fn negative_weights_are_rejected() {
    let service = plain_service();
    let mut request = request(&[], &[]);
    request.weights = Some(ScoreWeights {
        intent: -5.0,
        ..ScoreWeights::default()
    });

    match service.recommend(request).await {
        Err(PipelineError::Validation(message)) => assert!(message.contains("intent")),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn top_n_truncates_the_ranking() {
    let service = plain_service();
    let mut request = request(&["moisturizing"], &[]);
    request.top_n = 2;

    let response = service.recommend(request).await.expect("pipeline succeeds");

    assert_eq!(response.recommendations.len(), 2);
}

#[tokio::test]
async fn unmatched_category_returns_empty_with_warning() {
    let service = plain_service();
    let mut request = request(&["moisturizing"], &[]);
    request.category_like = Some("sunscreen".to_string());

    let response = service.recommend(request).await.expect("empty is not an error");

    assert!(response.recommendations.is_empty());
    assert_eq!(response.stats.total_candidates, 0);
    assert!(response
        .stats
        .warnings
        .contains(&"no candidates matched the request".to_string()));
}

#[tokio::test]
async fn category_filter_limits_candidates() {
    let service = plain_service();
    let mut request = request(&["soothing"], &[]);
    request.category_like = Some("cream".to_string());

    let response = service.recommend(request).await.expect("pipeline succeeds");

    assert_eq!(response.stats.total_candidates, 2);
    assert!(response
        .recommendations
        .iter()
        .all(|item| item.candidate.category == "cream"));
    assert_eq!(response.recommendations[0].candidate.id, CandidateId(4));
}

#[tokio::test]
async fn offline_catalog_is_a_provider_error() {
    let rules = Arc::new(RuleStore::from_config(RuleStoreConfig::default()));
    let profiles = Arc::new(crate::catalog::MatcherProfileProvider::new(catalog()));
    let service = RecommendationService::new(
        PipelineConfig::default(),
        rules,
        Arc::new(OfflineCatalog),
        profiles,
    );

    match service.recommend(request(&[], &[])).await {
        Err(PipelineError::Provider(err)) => assert!(err.to_string().contains("offline")),
        other => panic!("expected provider error, got {other:?}"),
    }
}

#[tokio::test]
async fn expired_budget_before_any_score_is_a_timeout() {
    let service = service_with(zero_timeout(), catalog());

    match service.recommend(request(&["moisturizing"], &[])).await {
        Err(PipelineError::Timeout(after)) => assert!(after.is_zero()),
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn scheduled_pipeline_matches_sequential() {
    let sequential = plain_service();
    let scheduled = full_service();
    let mut request = request(&["moisturizing"], &["B01AA03"]);
    request.use_cache = false;

    let expected = sequential
        .recommend(request.clone())
        .await
        .expect("sequential pipeline succeeds");
    let actual = scheduled.recommend(request).await.expect("scheduled pipeline succeeds");

    assert_eq!(ids(&actual), ids(&expected));
    let stats = scheduled.scheduler_stats().expect("scheduler attached");
    assert_eq!(stats.completed, 5);
    assert!(sequential.scheduler_stats().is_none());
    scheduled.close().await;
}

#[tokio::test]
async fn repeated_request_is_served_from_cache() {
    let service = full_service();
    let request = request(&["moisturizing"], &["B01AA03"]);

    let first = service.recommend(request.clone()).await.expect("first call");
    let second = service.recommend(request.clone()).await.expect("second call");

    assert!(!first.stats.cache_hit);
    assert!(second.stats.cache_hit);
    assert_ne!(first.request_id, second.request_id);
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(service.stats().requests, 2);
    assert_eq!(service.stats().cache_hits, 1);

    let uncached = RecommendationRequest {
        use_cache: false,
        ..request
    };
    let third = service.recommend(uncached).await.expect("third call");
    assert!(!third.stats.cache_hit);
    assert_eq!(third.stats.score_cache_hits, 5);
    service.close().await;
}

#[tokio::test]
async fn medication_order_does_not_split_the_cache() {
    let service = full_service();

    service
        .recommend(request(&[], &["B01AA03", "H02AB"]))
        .await
        .expect("first call");
    let reordered = service
        .recommend(request(&[], &["h02ab", "B01AA03"]))
        .await
        .expect("second call");

    assert!(reordered.stats.cache_hit);
    service.close().await;
}

#[tokio::test]
async fn reloading_rules_drops_cached_responses() {
    let service = full_service();
    let request = request(&["moisturizing"], &["B01AA03"]);
    service.recommend(request.clone()).await.expect("first call");

    let stats = service.reload_rules().await.expect("bundled rules reload");
    let after = service.recommend(request).await.expect("after reload");

    assert_eq!(stats.version, "builtin-1");
    assert!(!after.stats.cache_hit);
    assert_eq!(after.stats.score_cache_hits, 0);
    service.close().await;
}

#[tokio::test]
async fn candidate_invalidation_drops_its_cached_data() {
    let service = full_service();
    service
        .recommend(request(&["moisturizing"], &[]))
        .await
        .expect("first call");

    let removed = service.invalidate_candidate(CandidateId(3)).await;

    assert_eq!(removed, 1);
    service.close().await;
}
