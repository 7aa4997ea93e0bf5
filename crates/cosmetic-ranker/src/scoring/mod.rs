//! Multi-factor scoring of eligible candidates.
//!
//! Each candidate gets an intent, a personalization and a safety score on `[0, 100]`,
//! combined by [`ScoreWeights`]. Penalty rules lower the safety score; they never exclude.

pub mod engine;
pub mod intent;
pub mod penalty;
pub mod weights;

#[cfg(test)]
mod tests;

pub use engine::{
    score_candidate, ScoredCandidate, ScoringConfig, ScoringContext, ScoringEngine, ScoringInput,
    ScoringOutcome,
};
pub use intent::{intent_keywords, intent_score};
pub use penalty::{
    assess_penalties, rule_group, PenaltyAssessment, PenaltyError, PenaltySeverity,
    PenaltyStatistics, MAX_GROUP_PENALTY, MAX_TOTAL_PENALTY,
};
pub use weights::{
    clamp_score, normalize_final_scores, ScoreBreakdown, ScoreWeights, NEUTRAL_SCORE,
};
