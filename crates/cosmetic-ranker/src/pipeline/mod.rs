//! Per-request orchestration: query, eligibility, scoring, ranking.
//!
//! [`RecommendationService`] is the one entrypoint transports call. Each stage hands the
//! next a fresh value, so no stage mutates another's output. Cache and scheduler are
//! optional; without them the pipeline recomputes and scores sequentially.

pub mod request;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use request::{
    ExcludedCandidate, PipelineStats, RecommendationRequest, RecommendationResponse, StageTimings,
};
pub use router::recommendation_router;
pub use service::{PipelineConfig, PipelineError, RecommendationService, ServiceStats};
