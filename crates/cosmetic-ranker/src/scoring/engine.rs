use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::keys::{SCORE_TAG, SCORE_TTL};
use crate::cache::{stable_hash, CacheKeys, MultiLevelCache};
use crate::catalog::{Candidate, CandidateId, IngredientAnalysis, ProfileMatch, UserProfile};
use crate::rules::{EvaluationContext, RuleSnapshot};
use crate::scheduler::{SchedulerError, TaskPriority, TaskScheduler};

use super::intent::intent_score;
use super::penalty::{assess_penalties, PenaltyAssessment, PenaltyError, PenaltyStatistics};
use super::weights::{normalize_final_scores, ScoreBreakdown, ScoreWeights, NEUTRAL_SCORE};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoringConfig {
    /// Min-max rescale final scores across each batch.
    pub normalize: bool,
}

/// Request-wide inputs shared by every per-candidate computation.
#[derive(Debug, Clone)]
pub struct ScoringContext {
    pub intent_tags: Vec<String>,
    pub user_profile: UserProfile,
    pub weights: ScoreWeights,
    pub resolved_codes: BTreeSet<String>,
    pub evaluation: EvaluationContext,
    pub snapshot: Arc<RuleSnapshot>,
}

impl ScoringContext {
    /// Hash of everything besides the candidate that a score depends on.
    pub fn cache_hash(&self) -> Result<String, serde_json::Error> {
        stable_hash(&json!({
            "intent_tags": self.intent_tags,
            "user_profile": self.user_profile,
            "weights": self.weights,
            "medications": self.resolved_codes,
            "context": self.evaluation,
            "ruleset": self.snapshot.version,
        }))
    }
}

pub struct ScoringInput {
    pub candidates: Vec<Candidate>,
    pub profile_matches: HashMap<CandidateId, ProfileMatch>,
    pub analyses: HashMap<CandidateId, IngredientAnalysis>,
    pub context: ScoringContext,
    /// Unfinished candidates fall back to neutral scores past this point.
    pub deadline: Option<Instant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub breakdown: ScoreBreakdown,
    pub penalty: PenaltyAssessment,
    /// Neutral scores were substituted because scoring failed or timed out.
    pub fallback: bool,
}

impl ScoredCandidate {
    pub fn final_score(&self) -> f64 {
        self.breakdown.final_score
    }

    pub fn intent_score(&self) -> f64 {
        self.breakdown.intent_score
    }

    pub fn penalty_count(&self) -> usize {
        self.penalty.hit_count()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScoringOutcome {
    /// Same order as the input candidates.
    pub scored: Vec<ScoredCandidate>,
    pub cache_hits: usize,
    pub fallbacks: usize,
    pub timed_out: usize,
    pub penalized: usize,
    pub penalty_rules_applied: usize,
    pub warnings: Vec<String>,
    pub elapsed: Duration,
}

impl ScoringOutcome {
    pub fn penalty_statistics(&self) -> PenaltyStatistics {
        PenaltyStatistics::collect(
            self.scored
                .iter()
                .map(|scored| (scored.candidate.id, &scored.penalty)),
        )
    }
}

#[derive(Serialize, Deserialize)]
struct CachedScore {
    breakdown: ScoreBreakdown,
    penalty: PenaltyAssessment,
}

/// Scores one candidate: intent overlap, profile compatibility, and safety after penalties.
pub fn score_candidate(
    candidate: &Candidate,
    profile: Option<&ProfileMatch>,
    analysis: Option<&IngredientAnalysis>,
    context: &ScoringContext,
) -> Result<(ScoreBreakdown, PenaltyAssessment), PenaltyError> {
    let penalty = assess_penalties(
        &context.snapshot,
        candidate,
        &context.resolved_codes,
        &context.evaluation,
    )?;
    let intent = intent_score(&context.intent_tags, candidate);
    let personalization = profile.map_or(NEUTRAL_SCORE, |profile| profile.overall_score);
    let baseline = analysis.map_or(80.0, IngredientAnalysis::baseline_safety);
    let safety = baseline - f64::from(penalty.penalty);
    Ok((
        ScoreBreakdown::new(intent, personalization, safety, &context.weights),
        penalty,
    ))
}

struct ScoreJob {
    candidate: Candidate,
    profile: Option<ProfileMatch>,
    analysis: Option<IngredientAnalysis>,
}

impl ScoreJob {
    fn score(
        &self,
        context: &ScoringContext,
    ) -> Result<(ScoreBreakdown, PenaltyAssessment), PenaltyError> {
        score_candidate(
            &self.candidate,
            self.profile.as_ref(),
            self.analysis.as_ref(),
            context,
        )
    }
}

enum JobResult {
    Scored(ScoreBreakdown, PenaltyAssessment),
    Failed(String),
    TimedOut,
}

/// Scores candidate batches, fanning out through the scheduler and memoizing through the
/// cache when either is attached.
pub struct ScoringEngine {
    config: ScoringConfig,
    scheduler: Option<Arc<TaskScheduler>>,
    cache: Option<Arc<MultiLevelCache>>,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            config,
            scheduler: None,
            cache: None,
        }
    }

    pub fn with_scheduler(mut self, scheduler: Arc<TaskScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn with_cache(mut self, cache: Arc<MultiLevelCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Never fails: candidates that cannot be scored get neutral scores and a warning.
    pub async fn score(&self, input: ScoringInput) -> ScoringOutcome {
        let started = std::time::Instant::now();
        let ScoringInput {
            candidates,
            mut profile_matches,
            mut analyses,
            context,
            deadline,
        } = input;
        let context = Arc::new(context);
        let mut outcome = ScoringOutcome::default();

        let context_hash = match &self.cache {
            Some(_) => match context.cache_hash() {
                Ok(hash) => Some(hash),
                Err(err) => {
                    warn!(error = %err, "score cache key unavailable; recomputing");
                    None
                }
            },
            None => None,
        };

        let mut results: Vec<Option<JobResult>> = Vec::with_capacity(candidates.len());
        let mut jobs = Vec::new();
        for (index, candidate) in candidates.iter().enumerate() {
            let cached = match (&self.cache, &context_hash) {
                (Some(cache), Some(hash)) => {
                    cache
                        .get_json::<CachedScore>(&CacheKeys::score(candidate.id, hash))
                        .await
                }
                _ => None,
            };
            match cached {
                Some(hit) => {
                    outcome.cache_hits += 1;
                    results.push(Some(JobResult::Scored(hit.breakdown, hit.penalty)));
                }
                None => {
                    results.push(None);
                    jobs.push((
                        index,
                        Arc::new(ScoreJob {
                            candidate: candidate.clone(),
                            profile: profile_matches.remove(&candidate.id),
                            analysis: analyses.remove(&candidate.id),
                        }),
                    ));
                }
            }
        }

        let pending: Vec<Arc<ScoreJob>> = jobs.iter().map(|(_, job)| Arc::clone(job)).collect();
        let computed = self
            .compute(pending, &context, deadline, &mut outcome.warnings)
            .await;
        for ((index, job), result) in jobs.into_iter().zip(computed) {
            if let (Some(cache), Some(hash), JobResult::Scored(breakdown, penalty)) =
                (&self.cache, &context_hash, &result)
            {
                let id = job.candidate.id;
                let tags = vec![
                    SCORE_TAG.to_string(),
                    CacheKeys::candidate_tag(id),
                    CacheKeys::ruleset_tag(&context.snapshot.version),
                ];
                let value = CachedScore {
                    breakdown: breakdown.clone(),
                    penalty: penalty.clone(),
                };
                cache
                    .set_json(&CacheKeys::score(id, hash), &value, SCORE_TTL, &tags)
                    .await;
            }
            results[index] = Some(result);
        }

        let mut timed_out = 0;
        for (candidate, result) in candidates.into_iter().zip(results) {
            let scored = match result {
                Some(JobResult::Scored(breakdown, penalty)) => ScoredCandidate {
                    candidate,
                    breakdown,
                    penalty,
                    fallback: false,
                },
                Some(JobResult::Failed(message)) => {
                    warn!(candidate = %candidate.id, error = %message, "scoring failed; neutral score used");
                    outcome
                        .warnings
                        .push(format!("candidate {}: {message}; neutral score used", candidate.id));
                    fallback(candidate, &context.weights)
                }
                Some(JobResult::TimedOut) | None => {
                    timed_out += 1;
                    fallback(candidate, &context.weights)
                }
            };
            if scored.fallback {
                outcome.fallbacks += 1;
            }
            if scored.penalty.penalty > 0 {
                outcome.penalized += 1;
            }
            outcome.penalty_rules_applied += scored.penalty.hit_count();
            outcome.scored.push(scored);
        }
        if timed_out > 0 {
            outcome.warnings.push(format!(
                "{timed_out} candidates timed out during scoring; neutral scores used"
            ));
        }
        outcome.timed_out = timed_out;

        if self.config.normalize {
            normalize_final_scores(outcome.scored.iter_mut().map(|scored| &mut scored.breakdown));
        }

        outcome.elapsed = started.elapsed();
        info!(
            candidates = outcome.scored.len(),
            cache_hits = outcome.cache_hits,
            fallbacks = outcome.fallbacks,
            penalized = outcome.penalized,
            elapsed_ms = outcome.elapsed.as_secs_f64() * 1000.0,
            "candidates scored"
        );
        outcome
    }

    async fn compute(
        &self,
        jobs: Vec<Arc<ScoreJob>>,
        context: &Arc<ScoringContext>,
        deadline: Option<Instant>,
        warnings: &mut Vec<String>,
    ) -> Vec<JobResult> {
        if jobs.is_empty() {
            return Vec::new();
        }
        if let Some(scheduler) = &self.scheduler {
            let task = |job: Arc<ScoreJob>| {
                let context = Arc::clone(context);
                async move { job.score(&context) }
            };
            let batch = scheduler
                .process_batch(
                    "score",
                    jobs.iter().cloned(),
                    TaskPriority::Normal,
                    deadline,
                    task,
                )
                .await;
            match batch {
                Ok(results) => {
                    return results
                        .into_iter()
                        .map(|result| match result {
                            Ok((breakdown, penalty)) => JobResult::Scored(breakdown, penalty),
                            Err(SchedulerError::Timeout { .. }) => JobResult::TimedOut,
                            Err(SchedulerError::Failed { message, .. }) => {
                                JobResult::Failed(message)
                            }
                            Err(other) => JobResult::Failed(other.to_string()),
                        })
                        .collect();
                }
                Err(err) => {
                    warn!(error = %err, "task scheduler unavailable; scoring sequentially");
                    warnings.push("task scheduler unavailable; scored sequentially".to_string());
                }
            }
        }

        debug!(candidates = jobs.len(), "scoring sequentially");
        jobs.iter()
            .map(|job| {
                if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                    return JobResult::TimedOut;
                }
                match job.score(context) {
                    Ok((breakdown, penalty)) => JobResult::Scored(breakdown, penalty),
                    Err(err) => JobResult::Failed(err.to_string()),
                }
            })
            .collect()
    }
}

fn fallback(candidate: Candidate, weights: &ScoreWeights) -> ScoredCandidate {
    ScoredCandidate {
        candidate,
        breakdown: ScoreBreakdown::neutral(weights),
        penalty: PenaltyAssessment::none(),
        fallback: true,
    }
}
