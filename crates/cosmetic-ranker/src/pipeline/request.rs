use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::catalog::{CandidateId, UserProfile};
use crate::ranking::{RankedCandidate, DEFAULT_TOP_N, MAX_TOP_N};
use crate::rules::{RuleHit, UsageContext};
use crate::scoring::ScoreWeights;

use super::service::PipelineError;

/// One recommendation request as received from a transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationRequest {
    pub intent_tags: Vec<String>,
    pub user_profile: UserProfile,
    /// ATC codes or `MULTI:` aliases.
    pub medications: Vec<String>,
    pub usage: UsageContext,
    pub preg_lact: bool,
    pub top_n: usize,
    pub weights: Option<ScoreWeights>,
    pub category_like: Option<String>,
    pub use_cache: bool,
}

impl Default for RecommendationRequest {
    fn default() -> Self {
        Self {
            intent_tags: Vec::new(),
            user_profile: UserProfile::default(),
            medications: Vec::new(),
            usage: UsageContext::default(),
            preg_lact: false,
            top_n: DEFAULT_TOP_N,
            weights: None,
            category_like: None,
            use_cache: true,
        }
    }
}

impl RecommendationRequest {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(1..=MAX_TOP_N).contains(&self.top_n) {
            return Err(PipelineError::Validation(format!(
                "top_n must be between 1 and {MAX_TOP_N}, got {}",
                self.top_n
            )));
        }
        if let Some(weights) = &self.weights {
            weights.validate().map_err(PipelineError::Validation)?;
        }
        Ok(())
    }

    pub fn effective_weights(&self) -> ScoreWeights {
        self.weights.unwrap_or_default()
    }

    /// Everything the response depends on, in hashable form. `use_cache` is left out and
    /// medication order does not matter.
    pub(crate) fn fingerprint(&self, ruleset_version: &str) -> Value {
        let mut medications: Vec<String> = self
            .medications
            .iter()
            .map(|code| code.trim().to_uppercase())
            .collect();
        medications.sort();
        medications.dedup();
        json!({
            "intent_tags": self.intent_tags,
            "user_profile": self.user_profile,
            "medications": medications,
            "usage": self.usage,
            "preg_lact": self.preg_lact,
            "top_n": self.top_n,
            "weights": self.effective_weights(),
            "category_like": self.category_like,
            "ruleset": ruleset_version,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedCandidate {
    pub id: CandidateId,
    pub reasons: Vec<String>,
    pub rule_hits: Vec<RuleHit>,
}

/// Wall-clock time per stage, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTimings {
    pub query_ms: f64,
    pub eligibility_ms: f64,
    pub scoring_ms: f64,
    pub ranking_ms: f64,
    pub total_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub total_candidates: usize,
    pub excluded_count: usize,
    pub penalized_count: usize,
    pub eligibility_rules_applied: usize,
    pub penalty_rules_applied: usize,
    pub score_cache_hits: usize,
    pub fallback_scores: usize,
    pub ruleset_version: String,
    pub timings: StageTimings,
    pub cache_hit: bool,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub request_id: String,
    pub recommendations: Vec<RankedCandidate>,
    pub excluded: Vec<ExcludedCandidate>,
    pub stats: PipelineStats,
    pub generated_at: DateTime<Utc>,
}
