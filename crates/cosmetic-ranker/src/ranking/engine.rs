use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::Candidate;
use crate::rules::RuleHit;
use crate::scoring::{ScoreBreakdown, ScoredCandidate};

use super::brand::{brand_tier, category_weight};
use super::reasons::recommendation_reasons;
use super::statistics::RankingStatistics;

pub const DEFAULT_TOP_N: usize = 10;
pub const MAX_TOP_N: usize = 20;

/// Per-brand and per-category admission limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiversityConfig {
    pub max_same_brand: usize,
    pub max_same_category: usize,
}

impl Default for DiversityConfig {
    fn default() -> Self {
        Self {
            max_same_brand: 3,
            max_same_category: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankingConfig {
    /// `None` disables diversification.
    pub diversity: Option<DiversityConfig>,
    /// Candidates scoring below this are dropped before diversification.
    pub min_score: Option<f64>,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            diversity: Some(DiversityConfig::default()),
            min_score: None,
        }
    }
}

/// Request fields the ranking depends on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankingQuery {
    pub intent_tags: Vec<String>,
    pub category_like: Option<String>,
    pub top_n: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub candidate: Candidate,
    /// 1-based, assigned after sorting, diversification and truncation.
    pub rank: usize,
    pub final_score: f64,
    pub intent_score: f64,
    pub penalty_score: u32,
    pub penalty_count: usize,
    pub breakdown: ScoreBreakdown,
    pub reasons: Vec<String>,
    pub rule_hits: Vec<RuleHit>,
    #[serde(default)]
    pub fallback: bool,
}

impl RankedCandidate {
    fn from_scored(scored: ScoredCandidate, query: &RankingQuery) -> Self {
        let ScoredCandidate {
            candidate,
            breakdown,
            penalty,
            fallback,
        } = scored;
        let reasons =
            recommendation_reasons(&candidate, breakdown.intent_score, penalty.penalty, query);
        Self {
            rank: 0,
            final_score: breakdown.final_score,
            intent_score: breakdown.intent_score,
            penalty_score: penalty.penalty,
            penalty_count: penalty.hits.len(),
            rule_hits: penalty.hits,
            candidate,
            breakdown,
            reasons,
            fallback,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RankingOutcome {
    pub ranked: Vec<RankedCandidate>,
    pub considered: usize,
    pub below_threshold: usize,
    /// Skipped because their brand or category was already at its limit.
    pub diversity_skipped: usize,
    pub elapsed: Duration,
}

impl RankingOutcome {
    pub fn statistics(&self) -> RankingStatistics {
        RankingStatistics::collect(&self.ranked)
    }
}

struct SortKey {
    final_score: f64,
    intent_score: f64,
    penalty_count: usize,
    brand_weight: u8,
    category_weight: u8,
    id: u64,
}

impl SortKey {
    fn of(ranked: &RankedCandidate, category_like: Option<&str>) -> Self {
        Self {
            final_score: ranked.final_score,
            intent_score: ranked.intent_score,
            penalty_count: ranked.penalty_count,
            brand_weight: brand_tier(&ranked.candidate.brand).weight(),
            category_weight: category_weight(&ranked.candidate.category, category_like),
            id: ranked.candidate.id.0,
        }
    }

    fn cmp(&self, other: &Self) -> Ordering {
        other
            .final_score
            .total_cmp(&self.final_score)
            .then_with(|| other.intent_score.total_cmp(&self.intent_score))
            .then_with(|| self.penalty_count.cmp(&other.penalty_count))
            .then_with(|| other.brand_weight.cmp(&self.brand_weight))
            .then_with(|| other.category_weight.cmp(&self.category_weight))
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Orders two candidates best-first: final score, intent score, fewer penalty hits,
/// brand preference, category match, then higher id.
pub fn compare_ranked(
    a: &RankedCandidate,
    b: &RankedCandidate,
    category_like: Option<&str>,
) -> Ordering {
    SortKey::of(a, category_like).cmp(&SortKey::of(b, category_like))
}

#[derive(Debug, Clone, Default)]
pub struct RankingEngine {
    config: RankingConfig,
}

impl RankingEngine {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    /// Ranks `scored` without mutating it. An empty input ranks empty; fewer survivors
    /// than `top_n` are all returned.
    pub fn rank(&self, scored: &[ScoredCandidate], query: &RankingQuery) -> RankingOutcome {
        let started = Instant::now();
        let mut outcome = RankingOutcome {
            considered: scored.len(),
            ..RankingOutcome::default()
        };
        if scored.is_empty() {
            debug!("nothing to rank");
            return outcome;
        }

        let category_like = query.category_like.as_deref();
        let mut keyed: Vec<(SortKey, RankedCandidate)> = Vec::with_capacity(scored.len());
        for candidate in scored {
            if let Some(min) = self.config.min_score {
                if candidate.final_score() < min {
                    outcome.below_threshold += 1;
                    continue;
                }
            }
            let ranked = RankedCandidate::from_scored(candidate.clone(), query);
            keyed.push((SortKey::of(&ranked, category_like), ranked));
        }
        keyed.sort_by(|(a, _), (b, _)| a.cmp(b));

        let mut brands: HashMap<String, usize> = HashMap::new();
        let mut categories: HashMap<String, usize> = HashMap::new();
        for (_, mut ranked) in keyed {
            if outcome.ranked.len() >= query.top_n {
                break;
            }
            if let Some(diversity) = &self.config.diversity {
                let brand = ranked.candidate.brand.trim().to_lowercase();
                let category = ranked.candidate.category.trim().to_lowercase();
                let brand_count = brands.get(&brand).copied().unwrap_or(0);
                let category_count = categories.get(&category).copied().unwrap_or(0);
                if brand_count >= diversity.max_same_brand
                    || category_count >= diversity.max_same_category
                {
                    debug!(candidate = %ranked.candidate.id, %brand, %category, "skipped for diversity");
                    outcome.diversity_skipped += 1;
                    continue;
                }
                *brands.entry(brand).or_default() += 1;
                *categories.entry(category).or_default() += 1;
            }
            ranked.rank = outcome.ranked.len() + 1;
            outcome.ranked.push(ranked);
        }

        outcome.elapsed = started.elapsed();
        info!(
            considered = outcome.considered,
            ranked = outcome.ranked.len(),
            diversity_skipped = outcome.diversity_skipped,
            below_threshold = outcome.below_threshold,
            elapsed_ms = outcome.elapsed.as_secs_f64() * 1000.0,
            "candidates ranked"
        );
        outcome
    }
}
