use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use cosmetic_ranker::pipeline::{recommendation_router, RecommendationService};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_service_routes(service: Arc<RecommendationService>) -> axum::Router {
    recommendation_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::build_service;
    use axum::body::Body;
    use axum::http::Request;
    use cosmetic_ranker::config::AppConfig;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tower::ServiceExt;

    fn state(ready: bool) -> AppState {
        let recorder = PrometheusBuilder::new().build_recorder();
        AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(recorder.handle()),
        }
    }

    #[tokio::test]
    async fn readiness_reflects_the_flag() {
        let state = state(false);
        let response = readiness_endpoint(Extension(state.clone()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        state.readiness.store(true, Ordering::Release);
        let response = readiness_endpoint(Extension(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn service_routes_answer_health_and_recommendations() {
        let config = AppConfig::load().expect("default config loads");
        let service = build_service(&config).expect("service builds");
        let app = with_service_routes(Arc::clone(&service)).layer(Extension(state(true)));

        let health = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("router responds");
        assert_eq!(health.status(), StatusCode::OK);

        let recommend = app
            .oneshot(
                Request::post("/api/v1/recommendations")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({ "intent_tags": ["soothing"], "top_n": 3 }).to_string(),
                    ))
                    .expect("request"),
            )
            .await
            .expect("router responds");
        assert_eq!(recommend.status(), StatusCode::OK);

        service.close().await;
    }
}
