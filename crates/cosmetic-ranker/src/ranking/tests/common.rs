use std::collections::BTreeMap;

use crate::catalog::{Candidate, CandidateId};
use crate::ranking::RankingQuery;
use crate::rules::{RuleHit, RuleId, RuleKind};
use crate::scoring::{PenaltyAssessment, ScoreBreakdown, ScoreWeights, ScoredCandidate};

pub(super) fn product(id: u64, brand: &str, category: &str) -> Candidate {
    Candidate {
        id: CandidateId(id),
        name: format!("Product {id}"),
        brand: brand.to_string(),
        category: category.to_string(),
        tags: Default::default(),
        attributes: BTreeMap::new(),
    }
}

pub(super) fn scored(candidate: Candidate, final_score: f64, intent_score: f64) -> ScoredCandidate {
    let mut breakdown = ScoreBreakdown::new(intent_score, 50.0, 80.0, &ScoreWeights::default());
    breakdown.final_score = final_score;
    ScoredCandidate {
        candidate,
        breakdown,
        penalty: PenaltyAssessment::none(),
        fallback: false,
    }
}

/// Adds `hits` penalty hits totalling `penalty`.
pub(super) fn penalized(mut scored: ScoredCandidate, hits: usize, penalty: u32) -> ScoredCandidate {
    scored.penalty.hits = (0..hits)
        .map(|n| RuleHit {
            rule_id: RuleId::new(format!("PEN_{n}")),
            kind: RuleKind::Penalty,
            weight: 10,
            rationale: "irritation risk".to_string(),
            citation: None,
        })
        .collect();
    scored.penalty.penalty = penalty;
    scored
}

pub(super) fn query(top_n: usize) -> RankingQuery {
    RankingQuery {
        intent_tags: vec!["moisturizing".to_string()],
        category_like: None,
        top_n,
    }
}

pub(super) fn ids(ranked: &[crate::ranking::RankedCandidate]) -> Vec<u64> {
    ranked.iter().map(|item| item.candidate.id.0).collect()
}
