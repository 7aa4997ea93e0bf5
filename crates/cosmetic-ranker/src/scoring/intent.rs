use crate::catalog::Candidate;

use super::weights::{clamp_score, NEUTRAL_SCORE};

/// Canonical intents and the keywords that signal them in tags and product names.
const INTENT_SYNONYMS: &[(&str, &[&str])] = &[
    (
        "moisturizing",
        &["moistur", "hyaluronic", "glycerin", "보습", "수분", "촉촉", "히알루론산", "글리세린"],
    ),
    (
        "hydrating",
        &["hydrat", "hyaluronic", "aqua", "water", "수분", "보습", "히알루론산", "아쿠아", "워터"],
    ),
    (
        "anti-aging",
        &["anti-aging", "wrinkle", "peptide", "collagen", "retinol", "안티에이징", "주름", "탄력", "노화방지", "펩타이드", "콜라겐"],
    ),
    (
        "cleansing",
        &["cleans", "foam", "wash", "클렌징", "세정", "깨끗", "폼", "워시"],
    ),
    (
        "brightening",
        &["bright", "whitening", "vitamin_c", "niacinamide", "미백", "브라이트닝", "화이트닝", "비타민c", "나이아신아마이드"],
    ),
    (
        "acne-care",
        &["acne", "blemish", "cica", "centella", "여드름", "트러블", "진정", "시카", "센텔라"],
    ),
    (
        "sensitive-care",
        &["sensitive", "gentle", "hypoallergenic", "민감", "순한", "저자극", "베이비", "센시티브"],
    ),
    (
        "soothing",
        &["sooth", "calming", "aloe", "chamomile", "진정", "수딩", "카밍", "알로에", "카모마일"],
    ),
    (
        "firming",
        &["firming", "lifting", "elastic", "peptide", "탄력", "리프팅", "퍼밍", "펩타이드"],
    ),
    (
        "pore-care",
        &["pore", "blackhead", "bha", "aha", "모공", "포어", "블랙헤드"],
    ),
];

/// Keywords for `intent`: the intent itself plus its synonyms, lower-cased.
pub fn intent_keywords(intent: &str) -> Vec<String> {
    let intent = intent.trim().to_lowercase();
    let mut keywords = vec![intent.clone()];
    if let Some((_, synonyms)) = INTENT_SYNONYMS.iter().find(|(name, _)| *name == intent) {
        keywords.extend(synonyms.iter().map(|keyword| keyword.to_lowercase()));
    }
    keywords.retain(|keyword| !keyword.is_empty());
    keywords.sort();
    keywords.dedup();
    keywords
}

/// Overlap between requested intents and the candidate's tags and name.
///
/// A tag hit counts 1.0 per intent, a name hit 0.5. No hits scores 30 for an untagged
/// candidate and 20 otherwise; any hit scores `20 + ratio·80 + min(5·tag hits, 20)`.
pub fn intent_score(intent_tags: &[String], candidate: &Candidate) -> f64 {
    let intents: Vec<&String> = intent_tags
        .iter()
        .filter(|intent| !intent.trim().is_empty())
        .collect();
    if intents.is_empty() {
        return NEUTRAL_SCORE;
    }

    let tags = candidate.canonical_tags();
    let name = candidate.name.to_lowercase();
    let mut matched = 0.0;
    let mut direct = 0u32;
    for intent in &intents {
        let keywords = intent_keywords(intent);
        let tag_hit = tags
            .iter()
            .any(|tag| keywords.iter().any(|keyword| tag.contains(keyword.as_str())));
        if tag_hit {
            matched += 1.0;
            direct += 1;
        } else if keywords.iter().any(|keyword| name.contains(keyword.as_str())) {
            matched += 0.5;
        }
    }

    if matched == 0.0 {
        return if tags.is_empty() { 30.0 } else { 20.0 };
    }
    let ratio = matched / intents.len() as f64;
    clamp_score(20.0 + ratio * 80.0 + f64::from((direct * 5).min(20)))
}
