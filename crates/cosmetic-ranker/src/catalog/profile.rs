use super::domain::{Candidate, IngredientAnalysis, ProfileMatch, UserProfile};

const AGE_WEIGHT: f64 = 0.5;
const SKIN_WEIGHT: f64 = 0.3;
const PREFERENCE_WEIGHT: f64 = 0.2;

struct AgeProfile {
    group: &'static str,
    beneficial: &'static [&'static str],
    harmful: &'static [&'static str],
    ingredient_preferences: &'static [(&'static str, f64)],
    /// Minimum baseline safety on a 0-10 scale.
    safety_threshold: f64,
}

struct SkinProfile {
    skin_type: &'static str,
    required: &'static [&'static str],
    avoid: &'static [&'static str],
    ingredient_preferences: &'static [(&'static str, f64)],
    safety_multiplier: f64,
}

const AGE_PROFILES: &[AgeProfile] = &[
    AgeProfile {
        group: "10s",
        beneficial: &["antibacterial", "anti-inflammatory", "sebum", "soothing", "pore"],
        harmful: &["irritation", "heavy", "strong acid", "retinol"],
        ingredient_preferences: &[
            ("salicylic acid", 1.5),
            ("tea tree", 1.4),
            ("niacinamide", 1.3),
            ("retinol", 0.2),
            ("aha", 0.6),
        ],
        safety_threshold: 6.0,
    },
    AgeProfile {
        group: "20s",
        beneficial: &["exfoliation", "hydration", "soothing", "brightening", "antioxidant", "pore"],
        harmful: &["irritation", "heavy", "fragrance", "alcohol"],
        ingredient_preferences: &[
            ("vitamin c", 1.4),
            ("niacinamide", 1.4),
            ("aha", 1.3),
            ("hyaluronic acid", 1.2),
            ("retinol", 0.9),
        ],
        safety_threshold: 5.0,
    },
    AgeProfile {
        group: "30s",
        beneficial: &["anti-wrinkle", "elasticity", "hydration", "antioxidant", "brightening"],
        harmful: &["irritation", "dryness", "fragrance"],
        ingredient_preferences: &[
            ("retinol", 1.3),
            ("peptide", 1.3),
            ("vitamin c", 1.2),
            ("ceramide", 1.2),
        ],
        safety_threshold: 5.0,
    },
    AgeProfile {
        group: "40s",
        beneficial: &["anti-wrinkle", "elasticity", "barrier", "nourishing", "hydration"],
        harmful: &["irritation", "dryness", "strong acid"],
        ingredient_preferences: &[
            ("peptide", 1.5),
            ("retinol", 1.3),
            ("ceramide", 1.4),
            ("collagen", 1.3),
        ],
        safety_threshold: 5.5,
    },
    AgeProfile {
        group: "50s",
        beneficial: &["barrier", "nourishing", "elasticity", "hydration", "regeneration"],
        harmful: &["irritation", "dryness", "strong acid", "alcohol"],
        ingredient_preferences: &[
            ("ceramide", 1.5),
            ("peptide", 1.4),
            ("squalane", 1.3),
            ("aha", 0.7),
        ],
        safety_threshold: 6.0,
    },
];

const SKIN_PROFILES: &[SkinProfile] = &[
    SkinProfile {
        skin_type: "dry",
        required: &["hydration", "moisture", "barrier", "nourishing"],
        avoid: &["dryness", "alcohol", "astringent", "exfoliation"],
        ingredient_preferences: &[
            ("hyaluronic acid", 1.5),
            ("ceramide", 1.5),
            ("glycerin", 1.4),
            ("squalane", 1.4),
            ("alcohol", 0.2),
            ("salicylic acid", 0.4),
        ],
        safety_multiplier: 1.2,
    },
    SkinProfile {
        skin_type: "oily",
        required: &["sebum", "pore", "exfoliation", "astringent"],
        avoid: &["comedogenic", "heavy", "occlusive"],
        ingredient_preferences: &[
            ("salicylic acid", 1.5),
            ("niacinamide", 1.4),
            ("zinc", 1.3),
            ("mineral oil", 0.3),
        ],
        safety_multiplier: 1.0,
    },
    SkinProfile {
        skin_type: "combination",
        required: &["balance", "hydration", "sebum"],
        avoid: &["heavy", "dryness"],
        ingredient_preferences: &[("niacinamide", 1.3), ("hyaluronic acid", 1.2)],
        safety_multiplier: 1.1,
    },
    SkinProfile {
        skin_type: "sensitive",
        required: &["soothing", "calming", "barrier"],
        avoid: &["irritation", "fragrance", "alcohol", "exfoliation", "photosensitivity"],
        ingredient_preferences: &[
            ("centella", 1.5),
            ("panthenol", 1.4),
            ("allantoin", 1.3),
            ("fragrance", 0.1),
            ("retinol", 0.4),
        ],
        safety_multiplier: 1.5,
    },
    SkinProfile {
        skin_type: "normal",
        required: &["hydration", "antioxidant", "brightening"],
        avoid: &["irritation"],
        ingredient_preferences: &[("vitamin c", 1.2), ("hyaluronic acid", 1.1)],
        safety_multiplier: 1.0,
    },
];

/// Scored dimension with the notes that explain it.
struct Dimension {
    score: f64,
    reasons: Vec<String>,
    mismatches: Vec<String>,
}

impl Dimension {
    fn neutral(note: String) -> Self {
        Self {
            score: 50.0,
            reasons: Vec::new(),
            mismatches: vec![note],
        }
    }

    fn finish(mut self) -> Self {
        self.score = self.score.clamp(0.0, 100.0);
        self.reasons.truncate(3);
        self.mismatches.truncate(3);
        self
    }
}

/// Computes age, skin-type, and preference compatibility from an ingredient analysis.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileMatcher;

impl ProfileMatcher {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(
        &self,
        candidate: &Candidate,
        analysis: &IngredientAnalysis,
        profile: &UserProfile,
    ) -> ProfileMatch {
        let age = match profile.age_group.as_deref() {
            Some(group) => self.age_compatibility(group, analysis),
            None => Dimension::neutral("age group not provided".to_string()),
        };
        let skin = match profile.skin_type.as_deref() {
            Some(skin_type) => self.skin_compatibility(skin_type, analysis),
            None => Dimension::neutral("skin type not provided".to_string()),
        };
        let preference = self.preference_compatibility(candidate, analysis, profile);

        let overall = (age.score * AGE_WEIGHT
            + skin.score * SKIN_WEIGHT
            + preference.score * PREFERENCE_WEIGHT)
            .clamp(0.0, 100.0);

        let reasons = summarize_reasons(profile, &[&age, &skin, &preference]);
        let mismatch_reasons = age
            .mismatches
            .iter()
            .chain(skin.mismatches.iter())
            .chain(preference.mismatches.iter())
            .cloned()
            .collect();

        ProfileMatch {
            candidate_id: candidate.id,
            age_score: age.score,
            skin_type_score: skin.score,
            preference_score: preference.score,
            overall_score: overall,
            reasons,
            mismatch_reasons,
        }
    }

    fn age_compatibility(&self, group: &str, analysis: &IngredientAnalysis) -> Dimension {
        let Some(profile) = AGE_PROFILES
            .iter()
            .find(|profile| profile.group.eq_ignore_ascii_case(group.trim()))
        else {
            return Dimension::neutral(format!("unknown age group '{group}'"));
        };

        let mut dimension = Dimension {
            score: 50.0,
            reasons: Vec::new(),
            mismatches: Vec::new(),
        };

        for effect in &analysis.beneficial_effects {
            let effect_name = effect.effect.to_lowercase();
            if profile.beneficial.iter().any(|b| effect_name.contains(b)) {
                let weight = if analysis.is_key_ingredient(&effect.ingredient) {
                    2.0
                } else {
                    1.0
                };
                dimension.score += 6.0 * weight;
                if dimension.reasons.len() < 2 {
                    dimension
                        .reasons
                        .push(format!("'{}' benefits the {} group", effect.effect, group));
                }
            }
        }

        let concerns = analysis
            .harmful_effects
            .iter()
            .map(|effect| (effect.effect.as_str(), Some(effect.ingredient.as_str())))
            .chain(analysis.safety_warnings.iter().map(|w| (w.as_str(), None)));
        for (concern, ingredient) in concerns {
            let lowered = concern.to_lowercase();
            if profile.harmful.iter().any(|h| lowered.contains(h)) {
                let key = ingredient.is_some_and(|name| analysis.is_key_ingredient(name));
                dimension.score -= if key { 15.0 } else { 8.0 };
                if dimension.mismatches.is_empty() {
                    dimension
                        .mismatches
                        .push(format!("'{concern}' is unsuitable for the {group} group"));
                }
            }
        }

        dimension.score += preference_bonus(profile.ingredient_preferences, analysis, 10.0);

        let safety = analysis.baseline_safety();
        let floor = profile.safety_threshold * 10.0;
        if safety < floor {
            dimension.score -= (floor - safety) * 0.5;
            dimension
                .mismatches
                .push(format!("below the safety bar for the {group} group"));
        }

        dimension.finish()
    }

    fn skin_compatibility(&self, skin_type: &str, analysis: &IngredientAnalysis) -> Dimension {
        let Some(profile) = SKIN_PROFILES
            .iter()
            .find(|profile| profile.skin_type.eq_ignore_ascii_case(skin_type.trim()))
        else {
            return Dimension::neutral(format!("unknown skin type '{skin_type}'"));
        };

        let mut dimension = Dimension {
            score: 50.0,
            reasons: Vec::new(),
            mismatches: Vec::new(),
        };

        for effect in &analysis.beneficial_effects {
            let effect_name = effect.effect.to_lowercase();
            if profile.required.iter().any(|r| effect_name.contains(r)) {
                dimension.score += 8.0;
                if dimension.reasons.len() < 2 {
                    dimension.reasons.push(format!(
                        "'{}' suits {} skin",
                        effect.effect, profile.skin_type
                    ));
                }
            }
        }

        let concerns = analysis
            .harmful_effects
            .iter()
            .map(|effect| effect.effect.as_str())
            .chain(analysis.safety_warnings.iter().map(String::as_str));
        for concern in concerns {
            let lowered = concern.to_lowercase();
            if profile.avoid.iter().any(|a| lowered.contains(a)) {
                dimension.score -= 12.0;
                if dimension.mismatches.is_empty() {
                    dimension.mismatches.push(format!(
                        "'{concern}' is unsuitable for {} skin",
                        profile.skin_type
                    ));
                }
            }
        }

        dimension.score += preference_bonus(profile.ingredient_preferences, analysis, 12.0);
        let adjusted = analysis.baseline_safety() * profile.safety_multiplier;
        dimension.score += (adjusted - 50.0) * 0.3;

        dimension.finish()
    }

    fn preference_compatibility(
        &self,
        candidate: &Candidate,
        analysis: &IngredientAnalysis,
        profile: &UserProfile,
    ) -> Dimension {
        let prefs = &profile.preferences;
        let mut dimension = Dimension {
            score: 50.0,
            reasons: Vec::new(),
            mismatches: Vec::new(),
        };

        if prefs
            .preferred_brands
            .iter()
            .any(|brand| brand.eq_ignore_ascii_case(&candidate.brand))
        {
            dimension.score += 25.0;
            dimension
                .reasons
                .push(format!("preferred brand '{}'", candidate.brand));
        }

        let safety = analysis.baseline_safety();
        for ingredient in &analysis.key_ingredients {
            let lowered = ingredient.to_lowercase();
            if prefs
                .preferred_ingredients
                .iter()
                .any(|p| lowered.contains(&p.to_lowercase()))
            {
                dimension.score += 15.0;
                dimension
                    .reasons
                    .push(format!("contains preferred ingredient '{ingredient}'"));
            }
            if prefs
                .avoided_ingredients
                .iter()
                .any(|a| lowered.contains(&a.to_lowercase()))
            {
                if safety > 70.0 {
                    dimension.score -= 10.0;
                } else {
                    dimension.score -= 20.0;
                }
                dimension
                    .mismatches
                    .push(format!("contains avoided ingredient '{ingredient}'"));
            }
        }

        if prefs
            .preferred_categories
            .iter()
            .any(|category| category.eq_ignore_ascii_case(&candidate.category))
        {
            dimension.score += 10.0;
            dimension
                .reasons
                .push(format!("preferred category '{}'", candidate.category));
        }

        if prefs.feedback_score != 0 {
            dimension.score += f64::from(prefs.feedback_score) * 5.0;
            if prefs.feedback_score > 0 {
                dimension.reasons.push("positive past feedback".to_string());
            } else {
                dimension
                    .mismatches
                    .push("negative past feedback".to_string());
            }
        }

        dimension.finish()
    }
}

/// First matching preference per key ingredient, scaled around a neutral weight of 1.0.
fn preference_bonus(
    preferences: &[(&'static str, f64)],
    analysis: &IngredientAnalysis,
    scale: f64,
) -> f64 {
    analysis
        .key_ingredients
        .iter()
        .filter_map(|ingredient| {
            let lowered = ingredient.to_lowercase().replace('_', " ");
            preferences
                .iter()
                .find(|(name, _)| lowered.contains(name))
                .map(|(_, weight)| (weight - 1.0) * scale)
        })
        .sum()
}

fn summarize_reasons(profile: &UserProfile, dimensions: &[&Dimension; 3]) -> Vec<String> {
    let labels = [
        profile.age_group.as_deref().unwrap_or("age"),
        profile.skin_type.as_deref().unwrap_or("skin type"),
        "preference",
    ];

    let mut ordered: Vec<(f64, &str, &Dimension)> = dimensions
        .iter()
        .zip(labels)
        .map(|(dimension, label)| (dimension.score, label, *dimension))
        .collect();
    ordered.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut reasons: Vec<String> = ordered
        .iter()
        .filter(|(score, _, _)| *score > 60.0)
        .filter_map(|(_, label, dimension)| {
            dimension
                .reasons
                .first()
                .map(|reason| format!("[{label}] {reason}"))
        })
        .take(3)
        .collect();

    if reasons.is_empty() {
        reasons.push(match (&profile.age_group, &profile.skin_type) {
            (Some(age), Some(skin)) => format!("suited to {age} {skin} skin"),
            _ => "suited to the personalization profile".to_string(),
        });
    }
    reasons
}
