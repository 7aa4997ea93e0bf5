//! Deterministic ordering of scored candidates.
//!
//! Ranking runs Sort, Diversify, Truncate and AssignRank in that order. The sort is a
//! strict total order, so the same scored input always yields the same ranking.

pub mod brand;
pub mod engine;
pub mod reasons;
pub mod statistics;

#[cfg(test)]
mod tests;

pub use brand::{brand_tier, category_weight, BrandTier};
pub use engine::{
    compare_ranked, DiversityConfig, RankedCandidate, RankingConfig, RankingEngine,
    RankingOutcome, RankingQuery, DEFAULT_TOP_N, MAX_TOP_N,
};
pub use reasons::recommendation_reasons;
pub use statistics::{BrandCount, DiversityInfo, RankingStatistics};
