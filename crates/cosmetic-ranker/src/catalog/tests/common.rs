use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::domain::{
    Candidate, CandidateId, IngredientAnalysis, IngredientEffect, UserProfile,
};

pub(super) fn serum() -> Candidate {
    Candidate {
        id: CandidateId(42),
        name: "Hyaluronic Barrier Serum".to_string(),
        brand: "Avene".to_string(),
        category: "serum".to_string(),
        tags: BTreeSet::from(["hyaluronic_acid".to_string(), "ceramide".to_string()]),
        attributes: BTreeMap::new(),
    }
}

pub(super) fn hydrating_analysis() -> IngredientAnalysis {
    IngredientAnalysis {
        candidate_id: CandidateId(42),
        beneficial_effects: vec![
            IngredientEffect::beneficial("hyaluronic acid", "hydration boost", 0.9),
            IngredientEffect::beneficial("ceramide", "barrier repair", 0.8),
        ],
        harmful_effects: Vec::new(),
        safety_warnings: Vec::new(),
        allergy_risks: Vec::new(),
        age_restrictions: Vec::new(),
        key_ingredients: vec!["hyaluronic acid".to_string(), "ceramide".to_string()],
    }
}

pub(super) fn irritating_analysis() -> IngredientAnalysis {
    IngredientAnalysis {
        candidate_id: CandidateId(42),
        beneficial_effects: Vec::new(),
        harmful_effects: vec![
            IngredientEffect::harmful("fragrance", "fragrance irritation", 0.7),
            IngredientEffect::harmful("alcohol", "dryness", 0.6),
        ],
        safety_warnings: vec!["irritation on broken skin".to_string()],
        allergy_risks: vec!["linalool".to_string()],
        age_restrictions: Vec::new(),
        key_ingredients: vec!["fragrance".to_string(), "alcohol".to_string()],
    }
}

pub(super) fn dry_thirties() -> UserProfile {
    UserProfile {
        age_group: Some("30s".to_string()),
        skin_type: Some("dry".to_string()),
        ..UserProfile::default()
    }
}
