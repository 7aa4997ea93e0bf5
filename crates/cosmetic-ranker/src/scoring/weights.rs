use serde::{Deserialize, Serialize};

pub const NEUTRAL_SCORE: f64 = 50.0;

/// Relative importance of the three score dimensions. Only the ratios matter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub intent: f64,
    pub personalization: f64,
    pub safety: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            intent: 30.0,
            personalization: 40.0,
            safety: 30.0,
        }
    }
}

impl ScoreWeights {
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("intent", self.intent),
            ("personalization", self.personalization),
            ("safety", self.safety),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("weight '{name}' must be a non-negative number"));
            }
        }
        Ok(())
    }

    pub fn total(&self) -> f64 {
        self.intent + self.personalization + self.safety
    }
}

/// Per-dimension scores of one candidate and the weights that combined them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub intent_score: f64,
    pub personalization_score: f64,
    pub safety_score: f64,
    pub intent_weight: f64,
    pub personalization_weight: f64,
    pub safety_weight: f64,
    pub final_score: f64,
    #[serde(default)]
    pub normalized: bool,
}

impl ScoreBreakdown {
    /// `Σ(score·weight)/Σweight` clamped to `[0, 100]`; 50 when every weight is zero.
    pub fn new(intent: f64, personalization: f64, safety: f64, weights: &ScoreWeights) -> Self {
        let intent = clamp_score(intent);
        let personalization = clamp_score(personalization);
        let safety = clamp_score(safety);
        let total = weights.total();
        let final_score = if total > 0.0 {
            clamp_score(
                (intent * weights.intent
                    + personalization * weights.personalization
                    + safety * weights.safety)
                    / total,
            )
        } else {
            NEUTRAL_SCORE
        };
        Self {
            intent_score: intent,
            personalization_score: personalization,
            safety_score: safety,
            intent_weight: weights.intent,
            personalization_weight: weights.personalization,
            safety_weight: weights.safety,
            final_score,
            normalized: false,
        }
    }

    /// All-50s breakdown used when a candidate could not be scored.
    pub fn neutral(weights: &ScoreWeights) -> Self {
        let mut neutral = Self::new(NEUTRAL_SCORE, NEUTRAL_SCORE, NEUTRAL_SCORE, weights);
        neutral.final_score = NEUTRAL_SCORE;
        neutral
    }
}

/// NaN maps to the neutral score.
pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        NEUTRAL_SCORE
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Min-max rescales `final_score` across the batch so the best reaches 100. Degenerate
/// batches (`max == min`) are left untouched.
pub fn normalize_final_scores<'a>(breakdowns: impl IntoIterator<Item = &'a mut ScoreBreakdown>) {
    let mut breakdowns: Vec<&mut ScoreBreakdown> = breakdowns.into_iter().collect();
    let (min, max) = breakdowns.iter().fold((f64::MAX, f64::MIN), |(min, max), b| {
        (min.min(b.final_score), max.max(b.final_score))
    });
    if breakdowns.is_empty() || max <= min {
        return;
    }
    for breakdown in breakdowns.iter_mut() {
        breakdown.final_score = clamp_score((breakdown.final_score - min) / (max - min) * 100.0);
        breakdown.normalized = true;
    }
}
