use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::keys::{
    ANALYSIS_TTL, CANDIDATES_TAG, CANDIDATES_TTL, RECOMMENDATION_TAG, RECOMMENDATION_TTL,
    RULES_TAG,
};
use crate::cache::{stable_hash, CacheKeys, CacheStats, MultiLevelCache};
use crate::catalog::{
    Candidate, CandidateFilters, CandidateId, CatalogProvider, IngredientAnalysis, ProfileMatch,
    ProfileProvider, ProviderError, UserProfile,
};
use crate::eligibility::{EligibilityFilter, EligibilityOutcome};
use crate::ranking::{RankingConfig, RankingEngine, RankingQuery};
use crate::rules::{
    EvaluationContext, RuleError, RuleSnapshot, RuleStatistics, RuleStore, ValidationReport,
};
use crate::scheduler::{ConcurrencyStats, TaskScheduler};
use crate::scoring::{ScoringConfig, ScoringContext, ScoringEngine, ScoringInput};

use super::request::{
    ExcludedCandidate, PipelineStats, RecommendationRequest, RecommendationResponse, StageTimings,
};

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Scoring that has not finished by then falls back to neutral scores.
    pub request_timeout: Duration,
    pub scoring: ScoringConfig,
    pub ranking: RankingConfig,
    pub cache_sweep_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            scoring: ScoringConfig::default(),
            ranking: RankingConfig::default(),
            cache_sweep_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("rules unavailable: {0}")]
    Rules(#[from] RuleError),
    #[error("catalog unavailable: {0}")]
    Provider(#[from] ProviderError),
    #[error("no candidate could be scored within {0:?}")]
    Timeout(Duration),
}

/// Request counters across the service lifetime.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServiceStats {
    pub requests: u64,
    pub cache_hits: u64,
    pub failures: u64,
    pub average_ms: f64,
}

#[derive(Default)]
struct Counters {
    requests: u64,
    cache_hits: u64,
    failures: u64,
    total_ms: f64,
}

static REQUEST_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> String {
    let id = REQUEST_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("req-{id:06}")
}

fn millis(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}

/// Composes eligibility, scoring and ranking per request. Safe to share across tasks.
pub struct RecommendationService {
    config: PipelineConfig,
    rules: Arc<RuleStore>,
    catalog: Arc<dyn CatalogProvider>,
    profiles: Arc<dyn ProfileProvider>,
    cache: Option<Arc<MultiLevelCache>>,
    scheduler: Option<Arc<TaskScheduler>>,
    scoring: ScoringEngine,
    ranking: RankingEngine,
    counters: Mutex<Counters>,
}

impl RecommendationService {
    pub fn new(
        config: PipelineConfig,
        rules: Arc<RuleStore>,
        catalog: Arc<dyn CatalogProvider>,
        profiles: Arc<dyn ProfileProvider>,
    ) -> Self {
        Self {
            scoring: ScoringEngine::new(config.scoring.clone()),
            ranking: RankingEngine::new(config.ranking.clone()),
            config,
            rules,
            catalog,
            profiles,
            cache: None,
            scheduler: None,
            counters: Mutex::new(Counters::default()),
        }
    }

    pub fn with_cache(mut self, cache: Arc<MultiLevelCache>) -> Self {
        self.scoring = self.scoring.with_cache(Arc::clone(&cache));
        self.cache = Some(cache);
        self
    }

    pub fn with_scheduler(mut self, scheduler: Arc<TaskScheduler>) -> Self {
        self.scoring = self.scoring.with_scheduler(Arc::clone(&scheduler));
        self.scheduler = Some(scheduler);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn rule_store(&self) -> &Arc<RuleStore> {
        &self.rules
    }

    /// Loads rules, starts the scheduler workers and the cache sweeper. Needs a runtime.
    pub fn init(&self) -> Result<(), PipelineError> {
        let snapshot = self.rules.init()?;
        if let Some(scheduler) = &self.scheduler {
            scheduler.start();
        }
        if let Some(cache) = &self.cache {
            cache.init(self.config.cache_sweep_interval);
        }
        info!(
            ruleset = %snapshot.version,
            cache = self.cache.is_some(),
            scheduler = self.scheduler.is_some(),
            "recommendation service initialized"
        );
        Ok(())
    }

    pub async fn close(&self) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.shutdown();
        }
        if let Some(cache) = &self.cache {
            cache.close().await;
        }
        self.rules.close();
        info!("recommendation service closed");
    }

    pub async fn recommend(
        &self,
        request: RecommendationRequest,
    ) -> Result<RecommendationResponse, PipelineError> {
        let started = Instant::now();
        let result = self.run(request, started).await;
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        counters.requests += 1;
        counters.total_ms += millis(started.elapsed());
        match &result {
            Ok(response) if response.stats.cache_hit => counters.cache_hits += 1,
            Ok(_) => {}
            Err(_) => counters.failures += 1,
        }
        result
    }

    async fn run(
        &self,
        request: RecommendationRequest,
        started: Instant,
    ) -> Result<RecommendationResponse, PipelineError> {
        request.validate()?;
        let request_id = next_request_id();
        let snapshot = self.rules.snapshot()?;

        let response_key = if request.use_cache {
            self.response_key(&request, &snapshot)
        } else {
            None
        };
        if let (Some(cache), Some(key)) = (&self.cache, &response_key) {
            if let Some(mut cached) = cache.get_json::<RecommendationResponse>(key).await {
                info!(%request_id, cached_request = %cached.request_id, "recommendation served from cache");
                cached.request_id = request_id;
                cached.stats.cache_hit = true;
                cached.stats.timings = StageTimings {
                    total_ms: millis(started.elapsed()),
                    ..StageTimings::default()
                };
                return Ok(cached);
            }
        }

        let mut warnings = Vec::new();
        let mut timings = StageTimings::default();

        let stage = Instant::now();
        let filters = CandidateFilters {
            category_like: request.category_like.clone(),
            limit: None,
        };
        let candidates = self.query_candidates(&request.intent_tags, &filters).await?;
        timings.query_ms = millis(stage.elapsed());
        let total_candidates = candidates.len();
        if candidates.is_empty() {
            warnings.push("no candidates matched the request".to_string());
        }

        let stage = Instant::now();
        let resolved = snapshot.resolve_codes(&request.medications);
        let context = EvaluationContext::from_usage(&request.usage, request.preg_lact);
        let eligibility =
            EligibilityFilter::with_snapshot(&snapshot, candidates, &resolved, &context);
        timings.eligibility_ms = millis(stage.elapsed());
        debug!(
            %request_id,
            kept = eligibility.kept.len(),
            excluded = eligibility.total_excluded(),
            "eligibility applied"
        );

        let stage = Instant::now();
        let (profile_matches, analyses) = self
            .gather(&eligibility.kept, &request.user_profile, &mut warnings)
            .await;
        let remaining = self.config.request_timeout.saturating_sub(started.elapsed());
        let input = ScoringInput {
            candidates: eligibility.kept.clone(),
            profile_matches,
            analyses,
            context: ScoringContext {
                intent_tags: request.intent_tags.clone(),
                user_profile: request.user_profile.clone(),
                weights: request.effective_weights(),
                resolved_codes: resolved,
                evaluation: context,
                snapshot: Arc::clone(&snapshot),
            },
            deadline: Some(tokio::time::Instant::now() + remaining),
        };
        let scoring = self.scoring.score(input).await;
        timings.scoring_ms = millis(stage.elapsed());
        if !scoring.scored.is_empty() && scoring.timed_out == scoring.scored.len() {
            warn!(%request_id, timeout = ?self.config.request_timeout, "request timed out before any candidate was scored");
            return Err(PipelineError::Timeout(self.config.request_timeout));
        }
        warnings.extend(scoring.warnings.iter().cloned());

        let stage = Instant::now();
        let query = RankingQuery {
            intent_tags: request.intent_tags.clone(),
            category_like: request.category_like.clone(),
            top_n: request.top_n,
        };
        let ranking = self.ranking.rank(&scoring.scored, &query);
        timings.ranking_ms = millis(stage.elapsed());
        timings.total_ms = millis(started.elapsed());

        let stats = PipelineStats {
            total_candidates,
            excluded_count: eligibility.total_excluded(),
            penalized_count: scoring.penalized,
            eligibility_rules_applied: eligibility.rules_applied,
            penalty_rules_applied: scoring.penalty_rules_applied,
            score_cache_hits: scoring.cache_hits,
            fallback_scores: scoring.fallbacks,
            ruleset_version: snapshot.version.clone(),
            timings,
            cache_hit: false,
            warnings,
        };
        let response = RecommendationResponse {
            request_id,
            recommendations: ranking.ranked,
            excluded: excluded_candidates(&eligibility),
            stats,
            generated_at: Utc::now(),
        };

        info!(
            request_id = %response.request_id,
            candidates = response.stats.total_candidates,
            excluded = response.stats.excluded_count,
            penalized = response.stats.penalized_count,
            returned = response.recommendations.len(),
            total_ms = response.stats.timings.total_ms,
            "recommendation completed"
        );

        if let (Some(cache), Some(key)) = (&self.cache, &response_key) {
            if scoring.fallbacks == 0 {
                let tags = vec![
                    RECOMMENDATION_TAG.to_string(),
                    RULES_TAG.to_string(),
                    CacheKeys::ruleset_tag(&snapshot.version),
                ];
                cache
                    .set_json(key, &response, RECOMMENDATION_TTL, &tags)
                    .await;
            } else {
                debug!(request_id = %response.request_id, "degraded response not cached");
            }
        }
        Ok(response)
    }

    fn response_key(
        &self,
        request: &RecommendationRequest,
        snapshot: &RuleSnapshot,
    ) -> Option<String> {
        self.cache.as_ref()?;
        match stable_hash(&request.fingerprint(&snapshot.version)) {
            Ok(hash) => Some(CacheKeys::recommendation(&hash)),
            Err(err) => {
                warn!(error = %err, "request could not be hashed; skipping response cache");
                None
            }
        }
    }

    /// Catalog query, memoized for a few minutes per (intents, filters).
    async fn query_candidates(
        &self,
        intent_tags: &[String],
        filters: &CandidateFilters,
    ) -> Result<Vec<Candidate>, ProviderError> {
        let key = match &self.cache {
            Some(_) => stable_hash(&(intent_tags, filters))
                .map(|hash| CacheKeys::candidates(&hash))
                .ok(),
            None => None,
        };
        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(cached) = cache.get_json::<Vec<Candidate>>(key).await {
                return Ok(cached);
            }
        }

        let candidates = self.catalog.candidates(intent_tags, filters).await?;
        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            cache
                .set_json(key, &candidates, CANDIDATES_TTL, &[CANDIDATES_TAG.to_string()])
                .await;
        }
        Ok(candidates)
    }

    /// Profile matches and ingredient analyses for the kept candidates. Missing data only
    /// degrades scoring to its defaults.
    async fn gather(
        &self,
        candidates: &[Candidate],
        profile: &UserProfile,
        warnings: &mut Vec<String>,
    ) -> (
        HashMap<CandidateId, ProfileMatch>,
        HashMap<CandidateId, IngredientAnalysis>,
    ) {
        let mut matches = HashMap::new();
        let mut analyses = HashMap::new();
        let mut failed = 0usize;
        for candidate in candidates {
            match self.profiles.profile_match(candidate.id, profile).await {
                Ok(found) => {
                    matches.insert(candidate.id, found);
                }
                Err(err) => {
                    failed += 1;
                    debug!(candidate = %candidate.id, error = %err, "profile match unavailable");
                }
            }
            if let Some(analysis) = self.analysis(candidate.id).await {
                analyses.insert(candidate.id, analysis);
            }
        }
        if failed > 0 {
            warnings.push(format!(
                "profile match unavailable for {failed} candidates; neutral personalization used"
            ));
        }
        (matches, analyses)
    }

    async fn analysis(&self, id: CandidateId) -> Option<IngredientAnalysis> {
        let key = CacheKeys::analysis(id);
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get_json::<IngredientAnalysis>(&key).await {
                return Some(cached);
            }
        }
        match self.catalog.ingredient_analysis(id).await {
            Ok(Some(analysis)) => {
                if let Some(cache) = &self.cache {
                    let tags = vec![CacheKeys::candidate_tag(id)];
                    cache.set_json(&key, &analysis, ANALYSIS_TTL, &tags).await;
                }
                Some(analysis)
            }
            Ok(None) => None,
            Err(err) => {
                warn!(candidate = %id, error = %err, "ingredient analysis unavailable");
                None
            }
        }
    }

    /// Reloads the ruleset and drops every cached result computed under older rules.
    pub async fn reload_rules(&self) -> Result<RuleStatistics, PipelineError> {
        let snapshot = self.rules.reload()?;
        if let Some(cache) = &self.cache {
            let removed = cache.invalidate_by_tags(&[RULES_TAG.to_string()]).await;
            let scores = cache.invalidate_by_pattern("score:*").await;
            info!(version = %snapshot.version, removed, scores, "rules reloaded, cached results dropped");
        }
        Ok(snapshot.statistics())
    }

    /// Drops cached analyses and scores of one candidate after a catalog change.
    pub async fn invalidate_candidate(&self, id: CandidateId) -> usize {
        match &self.cache {
            Some(cache) => cache.invalidate_by_tags(&[CacheKeys::candidate_tag(id)]).await,
            None => 0,
        }
    }

    pub fn rule_statistics(&self) -> Result<RuleStatistics, PipelineError> {
        Ok(self.rules.snapshot()?.statistics())
    }

    pub fn rule_validation(&self) -> Result<ValidationReport, PipelineError> {
        Ok(self.rules.validate()?)
    }

    pub async fn cache_stats(&self) -> Vec<CacheStats> {
        match &self.cache {
            Some(cache) => cache.stats().await,
            None => Vec::new(),
        }
    }

    pub fn scheduler_stats(&self) -> Option<ConcurrencyStats> {
        self.scheduler.as_ref().map(|scheduler| scheduler.stats())
    }

    pub fn stats(&self) -> ServiceStats {
        let counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        let average_ms = if counters.requests == 0 {
            0.0
        } else {
            counters.total_ms / counters.requests as f64
        };
        ServiceStats {
            requests: counters.requests,
            cache_hits: counters.cache_hits,
            failures: counters.failures,
            average_ms,
        }
    }
}

fn excluded_candidates(outcome: &EligibilityOutcome) -> Vec<ExcludedCandidate> {
    outcome
        .excluded
        .iter()
        .map(|(id, hits)| ExcludedCandidate {
            id: *id,
            reasons: outcome.reasons.get(id).cloned().unwrap_or_default(),
            rule_hits: hits.clone(),
        })
        .collect()
}
