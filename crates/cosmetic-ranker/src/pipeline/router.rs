use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;

use crate::rules::RuleError;

use super::request::RecommendationRequest;
use super::service::{PipelineError, RecommendationService};

/// Router exposing recommendations plus rule, cache and scheduler introspection.
pub fn recommendation_router(service: Arc<RecommendationService>) -> Router {
    Router::new()
        .route("/api/v1/recommendations", post(recommend_handler))
        .route("/api/v1/rules/statistics", get(rule_statistics_handler))
        .route("/api/v1/rules/validation", get(rule_validation_handler))
        .route("/api/v1/rules/reload", post(rule_reload_handler))
        .route("/api/v1/cache/stats", get(cache_stats_handler))
        .route("/api/v1/scheduler/stats", get(scheduler_stats_handler))
        .route("/api/v1/pipeline/stats", get(pipeline_stats_handler))
        .with_state(service)
}

pub(crate) fn status_for(error: &PipelineError) -> StatusCode {
    match error {
        PipelineError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PipelineError::Rules(RuleError::Invalid(_) | RuleError::Malformed { .. }) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        PipelineError::Rules(_) | PipelineError::Provider(_) => StatusCode::SERVICE_UNAVAILABLE,
        PipelineError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
    }
}

fn error_response(error: PipelineError) -> Response {
    let payload = json!({
        "error": error.to_string(),
    });
    (status_for(&error), axum::Json(payload)).into_response()
}

pub(crate) async fn recommend_handler(
    State(service): State<Arc<RecommendationService>>,
    axum::Json(request): axum::Json<RecommendationRequest>,
) -> Response {
    match service.recommend(request).await {
        Ok(response) => (StatusCode::OK, axum::Json(response)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn rule_statistics_handler(State(service): State<Arc<RecommendationService>>) -> Response {
    match service.rule_statistics() {
        Ok(stats) => (StatusCode::OK, axum::Json(stats)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn rule_validation_handler(State(service): State<Arc<RecommendationService>>) -> Response {
    match service.rule_validation() {
        Ok(report) => {
            let summary = report.summary();
            let payload = json!({
                "source": service.rule_store().source_description(),
                "summary": summary,
                "report": report,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

async fn rule_reload_handler(State(service): State<Arc<RecommendationService>>) -> Response {
    match service.reload_rules().await {
        Ok(stats) => (StatusCode::OK, axum::Json(stats)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn cache_stats_handler(State(service): State<Arc<RecommendationService>>) -> Response {
    let levels = service.cache_stats().await;
    (StatusCode::OK, axum::Json(json!({ "levels": levels }))).into_response()
}

async fn scheduler_stats_handler(State(service): State<Arc<RecommendationService>>) -> Response {
    match service.scheduler_stats() {
        Some(stats) => (StatusCode::OK, axum::Json(stats)).into_response(),
        None => {
            let payload = json!({
                "error": "task scheduler not configured",
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
    }
}

async fn pipeline_stats_handler(State(service): State<Arc<RecommendationService>>) -> Response {
    (StatusCode::OK, axum::Json(service.stats())).into_response()
}
