use serde::{Deserialize, Serialize};

const PREMIUM_BRANDS: &[&str] = &[
    "la roche-posay",
    "avene",
    "vichy",
    "cetaphil",
    "eucerin",
    "라로슈포제",
    "아벤느",
    "비쉬",
    "세타필",
    "유세린",
];

const POPULAR_BRANDS: &[&str] = &[
    "innisfree",
    "etude house",
    "the face shop",
    "toni&guy",
    "이니스프리",
    "에뛰드하우스",
    "더페이스샵",
    "토니앤가이",
];

/// Static brand preference used as a ranking tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrandTier {
    Unknown,
    Other,
    Popular,
    Premium,
}

impl BrandTier {
    pub fn weight(self) -> u8 {
        match self {
            BrandTier::Premium => 10,
            BrandTier::Popular => 5,
            BrandTier::Other => 1,
            BrandTier::Unknown => 0,
        }
    }
}

/// Matches the brand name against the tables by case-insensitive containment.
pub fn brand_tier(brand: &str) -> BrandTier {
    let brand = brand.trim().to_lowercase();
    if brand.is_empty() {
        return BrandTier::Unknown;
    }
    if PREMIUM_BRANDS.iter().any(|known| brand.contains(known)) {
        BrandTier::Premium
    } else if POPULAR_BRANDS.iter().any(|known| brand.contains(known)) {
        BrandTier::Popular
    } else {
        BrandTier::Other
    }
}

/// 10 when the requested category is contained in `category`, 5 when any requested word
/// is, 0 otherwise or without a request.
pub fn category_weight(category: &str, requested: Option<&str>) -> u8 {
    let Some(requested) = requested.map(|value| value.trim().to_lowercase()) else {
        return 0;
    };
    let category = category.trim().to_lowercase();
    if requested.is_empty() || category.is_empty() {
        return 0;
    }
    if category.contains(&requested) {
        10
    } else if requested
        .split_whitespace()
        .any(|word| category.contains(word))
    {
        5
    } else {
        0
    }
}
