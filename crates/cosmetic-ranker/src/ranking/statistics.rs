use std::collections::BTreeMap;

use serde::Serialize;

use super::engine::RankedCandidate;

const TOP_BRANDS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrandCount {
    pub brand: String,
    pub count: usize,
}

/// How spread the ranked list is over brands and categories.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiversityInfo {
    pub unique_brands: usize,
    pub unique_categories: usize,
    pub brand_distribution: BTreeMap<String, usize>,
    pub category_distribution: BTreeMap<String, usize>,
    /// Unique brands over ranked candidates, two decimals.
    pub diversity_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RankingStatistics {
    pub total: usize,
    pub average_final_score: f64,
    pub average_intent_score: f64,
    pub score_distribution: BTreeMap<String, usize>,
    pub intent_distribution: BTreeMap<String, usize>,
    pub penalty_distribution: BTreeMap<String, usize>,
    pub top_brands: Vec<BrandCount>,
    pub diversity: DiversityInfo,
}

impl RankingStatistics {
    pub fn collect(ranked: &[RankedCandidate]) -> Self {
        if ranked.is_empty() {
            return Self::default();
        }

        let mut stats = Self {
            total: ranked.len(),
            ..Self::default()
        };
        let score_buckets = ["90-100", "80-89", "70-79", "60-69", "<60"];
        let intent_buckets = ["80+", "60-79", "40-59", "<40"];
        let penalty_buckets = ["0", "1-10", "11-25", "26+"];
        for bucket in score_buckets {
            stats.score_distribution.insert(bucket.to_string(), 0);
        }
        for bucket in intent_buckets {
            stats.intent_distribution.insert(bucket.to_string(), 0);
        }
        for bucket in penalty_buckets {
            stats.penalty_distribution.insert(bucket.to_string(), 0);
        }

        let mut final_sum = 0.0;
        let mut intent_sum = 0.0;
        let mut brands: BTreeMap<String, usize> = BTreeMap::new();
        let mut categories: BTreeMap<String, usize> = BTreeMap::new();
        for item in ranked {
            final_sum += item.final_score;
            intent_sum += item.intent_score;

            let score_bucket = match item.final_score {
                s if s >= 90.0 => score_buckets[0],
                s if s >= 80.0 => score_buckets[1],
                s if s >= 70.0 => score_buckets[2],
                s if s >= 60.0 => score_buckets[3],
                _ => score_buckets[4],
            };
            let intent_bucket = match item.intent_score {
                s if s >= 80.0 => intent_buckets[0],
                s if s >= 60.0 => intent_buckets[1],
                s if s >= 40.0 => intent_buckets[2],
                _ => intent_buckets[3],
            };
            let penalty_bucket = match item.penalty_score {
                0 => penalty_buckets[0],
                1..=10 => penalty_buckets[1],
                11..=25 => penalty_buckets[2],
                _ => penalty_buckets[3],
            };
            *stats.score_distribution.entry(score_bucket.to_string()).or_default() += 1;
            *stats.intent_distribution.entry(intent_bucket.to_string()).or_default() += 1;
            *stats.penalty_distribution.entry(penalty_bucket.to_string()).or_default() += 1;

            let brand = item.candidate.brand.trim();
            if !brand.is_empty() {
                *brands.entry(brand.to_string()).or_default() += 1;
            }
            let category = item.candidate.category.trim();
            if !category.is_empty() {
                *categories.entry(category.to_string()).or_default() += 1;
            }
        }

        let total = ranked.len() as f64;
        stats.average_final_score = round1(final_sum / total);
        stats.average_intent_score = round1(intent_sum / total);

        let mut top: Vec<BrandCount> = brands
            .iter()
            .map(|(brand, count)| BrandCount {
                brand: brand.clone(),
                count: *count,
            })
            .collect();
        top.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.brand.cmp(&b.brand)));
        top.truncate(TOP_BRANDS);
        stats.top_brands = top;

        stats.diversity = DiversityInfo {
            unique_brands: brands.len(),
            unique_categories: categories.len(),
            diversity_score: (brands.len() as f64 / total * 100.0).round() / 100.0,
            brand_distribution: brands,
            category_distribution: categories,
        };
        stats
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
