//! Medication-aware product ranking core.
//!
//! Requests flow through eligibility filtering, parallel scoring, and deterministic ranking.
//! The rule store, cache, and task scheduler are constructed explicitly and handed to the
//! [`pipeline::RecommendationService`], which is the single entrypoint transports call.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod pipeline;
pub mod ranking;
pub mod rules;
pub mod scheduler;
pub mod scoring;
pub mod telemetry;
