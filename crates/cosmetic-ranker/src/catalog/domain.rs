use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Catalog identifier. Higher ids are newer listings.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CandidateId(pub u64);

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read-only view of a catalog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
    pub brand: String,
    pub category: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Candidate {
    /// Canonical tags: trimmed, lower-cased, deduplicated.
    pub fn canonical_tags(&self) -> BTreeSet<String> {
        self.tags
            .iter()
            .map(|tag| tag.trim().to_lowercase())
            .filter(|tag| !tag.is_empty())
            .collect()
    }
}

/// Query filters forwarded to the catalog provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateFilters {
    #[serde(default)]
    pub category_like: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// One ingredient-level effect. Beneficial weights are positive, harmful ones negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientEffect {
    pub ingredient: String,
    pub effect: String,
    pub weight: f64,
}

impl IngredientEffect {
    pub fn beneficial(ingredient: &str, effect: &str, confidence: f64) -> Self {
        Self {
            ingredient: ingredient.to_string(),
            effect: effect.to_string(),
            weight: confidence.clamp(0.0, 1.0) * 100.0,
        }
    }

    pub fn harmful(ingredient: &str, effect: &str, confidence: f64) -> Self {
        Self {
            ingredient: ingredient.to_string(),
            effect: effect.to_string(),
            weight: -(confidence.clamp(0.0, 1.0) * 100.0),
        }
    }
}

/// Per-candidate ingredient analysis. Independent of the requesting user.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IngredientAnalysis {
    pub candidate_id: CandidateId,
    #[serde(default)]
    pub beneficial_effects: Vec<IngredientEffect>,
    #[serde(default)]
    pub harmful_effects: Vec<IngredientEffect>,
    #[serde(default)]
    pub safety_warnings: Vec<String>,
    #[serde(default)]
    pub allergy_risks: Vec<String>,
    #[serde(default)]
    pub age_restrictions: Vec<String>,
    #[serde(default)]
    pub key_ingredients: Vec<String>,
}

impl IngredientAnalysis {
    pub fn empty(candidate_id: CandidateId) -> Self {
        Self {
            candidate_id,
            ..Self::default()
        }
    }

    /// Safety before any medication rule applies: 80 minus effect, warning and allergy deductions.
    pub fn baseline_safety(&self) -> f64 {
        let effect_penalty: f64 = self
            .harmful_effects
            .iter()
            .map(|effect| effect.weight.abs() * 0.1)
            .sum();
        let score = 80.0
            - effect_penalty
            - 5.0 * self.safety_warnings.len() as f64
            - 8.0 * self.allergy_risks.len() as f64;
        score.clamp(0.0, 100.0)
    }

    pub(crate) fn is_key_ingredient(&self, ingredient: &str) -> bool {
        self.key_ingredients
            .iter()
            .any(|key| key.eq_ignore_ascii_case(ingredient))
    }
}

/// Personal preferences captured alongside the profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPreferences {
    pub preferred_brands: Vec<String>,
    pub preferred_ingredients: Vec<String>,
    pub avoided_ingredients: Vec<String>,
    pub preferred_categories: Vec<String>,
    pub feedback_score: i8,
}

/// Requesting user's profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub age_group: Option<String>,
    pub skin_type: Option<String>,
    pub concerns: Vec<String>,
    pub preferences: UserPreferences,
}

/// Derived compatibility between one candidate and one profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileMatch {
    pub candidate_id: CandidateId,
    pub age_score: f64,
    pub skin_type_score: f64,
    pub preference_score: f64,
    pub overall_score: f64,
    pub reasons: Vec<String>,
    pub mismatch_reasons: Vec<String>,
}

impl ProfileMatch {
    pub fn neutral(candidate_id: CandidateId) -> Self {
        Self {
            candidate_id,
            age_score: 50.0,
            skin_type_score: 50.0,
            preference_score: 50.0,
            overall_score: 50.0,
            reasons: Vec::new(),
            mismatch_reasons: Vec::new(),
        }
    }

    pub fn match_level(&self) -> MatchLevel {
        MatchLevel::from_score(self.overall_score)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchLevel {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl MatchLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Self::Excellent
        } else if score >= 70.0 {
            Self::Good
        } else if score >= 50.0 {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
        }
    }
}
