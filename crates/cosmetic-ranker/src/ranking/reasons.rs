use super::brand::{brand_tier, category_weight, BrandTier};
use super::engine::RankingQuery;
use crate::catalog::Candidate;

const MAX_REASONS: usize = 3;

/// Up to three short, user-facing reasons for recommending `candidate`.
pub fn recommendation_reasons(
    candidate: &Candidate,
    intent_score: f64,
    penalty: u32,
    query: &RankingQuery,
) -> Vec<String> {
    let mut reasons = Vec::new();

    if intent_score >= 80.0 {
        let intents = if query.intent_tags.is_empty() {
            "the requested use".to_string()
        } else {
            query
                .intent_tags
                .iter()
                .take(2)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        };
        reasons.push(format!("a strong match for {intents}"));
    } else if intent_score >= 60.0 {
        reasons.push("suits the requested use".to_string());
    }

    if penalty == 0 {
        reasons.push("no safety concerns with your medications".to_string());
    } else if penalty <= 15 {
        reasons.push("minor cautions, generally safe".to_string());
    }

    match brand_tier(&candidate.brand) {
        BrandTier::Premium => reasons.push(format!(
            "{} is a brand trusted by dermatologists",
            candidate.brand
        )),
        BrandTier::Popular => reasons.push(format!("{} is a popular brand", candidate.brand)),
        BrandTier::Other | BrandTier::Unknown => {}
    }

    if let Some(requested) = query.category_like.as_deref() {
        if category_weight(&candidate.category, Some(requested)) >= 10 {
            reasons.push(format!("matches the requested {requested} category"));
        }
    }

    if penalty > 25 {
        reasons.push("some cautions apply, check before use".to_string());
    }

    if reasons.is_empty() {
        reasons.push("a well-rounded pick overall".to_string());
    }
    reasons.truncate(MAX_REASONS);
    reasons
}
