use cosmetic_ranker::cache::MultiLevelCache;
use cosmetic_ranker::catalog::{
    Candidate, CandidateId, InMemoryCatalog, IngredientAnalysis, IngredientEffect,
    MatcherProfileProvider,
};
use cosmetic_ranker::config::AppConfig;
use cosmetic_ranker::error::AppError;
use cosmetic_ranker::pipeline::RecommendationService;
use cosmetic_ranker::rules::RuleStore;
use cosmetic_ranker::scheduler::TaskScheduler;
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

struct DemoProduct {
    id: u64,
    name: &'static str,
    brand: &'static str,
    category: &'static str,
    tags: &'static [&'static str],
    key_ingredients: &'static [&'static str],
    harmful: &'static [(&'static str, &'static str, f64)],
    warnings: &'static [&'static str],
}

const DEMO_PRODUCTS: &[DemoProduct] = &[
    DemoProduct {
        id: 1,
        name: "Hydrating Moisturizer",
        brand: "Laneige",
        category: "moisturizer",
        tags: &["moisturizing", "hyaluronic_acid", "dry_skin"],
        key_ingredients: &["hyaluronic_acid", "ceramide"],
        harmful: &[],
        warnings: &[],
    },
    DemoProduct {
        id: 2,
        name: "Renewal Anti-Aging Serum",
        brand: "Sulwhasoo",
        category: "serum",
        tags: &["anti_aging", "retinoid", "wrinkle_care"],
        key_ingredients: &["retinol", "peptide"],
        harmful: &[("retinol", "irritation", 0.4)],
        warnings: &["avoid during pregnancy"],
    },
    DemoProduct {
        id: 3,
        name: "Nourishing Night Cream",
        brand: "Estee Lauder",
        category: "night cream",
        tags: &["moisturizing", "anti_aging", "night_care"],
        key_ingredients: &["squalane", "ceramide"],
        harmful: &[],
        warnings: &[],
    },
    DemoProduct {
        id: 4,
        name: "Gentle Cleansing Foam",
        brand: "Cetaphil",
        category: "cleanser",
        tags: &["cleansing", "sensitive_care", "gentle"],
        key_ingredients: &["glycerin"],
        harmful: &[],
        warnings: &[],
    },
    DemoProduct {
        id: 5,
        name: "Oil Control BHA Toner",
        brand: "Cosrx",
        category: "toner",
        tags: &["oil_control", "pore_care", "bha"],
        key_ingredients: &["salicylic_acid"],
        harmful: &[("salicylic_acid", "dryness", 0.3)],
        warnings: &[],
    },
    DemoProduct {
        id: 6,
        name: "Aqua Soothing Gel",
        brand: "Innisfree",
        category: "gel",
        tags: &["soothing", "sensitive_care", "hydrating"],
        key_ingredients: &["aloe", "centella"],
        harmful: &[],
        warnings: &[],
    },
    DemoProduct {
        id: 7,
        name: "Glow AHA Peeling Essence",
        brand: "Some By Mi",
        category: "essence",
        tags: &["exfoliating", "aha", "brightening"],
        key_ingredients: &["glycolic_acid"],
        harmful: &[("glycolic_acid", "photosensitivity", 0.5)],
        warnings: &["use sunscreen during the day"],
    },
    DemoProduct {
        id: 8,
        name: "Vitamin C Brightening Serum",
        brand: "Klairs",
        category: "serum",
        tags: &["brightening", "vitamin_c", "anti_oxidant"],
        key_ingredients: &["ascorbic_acid"],
        harmful: &[],
        warnings: &[],
    },
    DemoProduct {
        id: 9,
        name: "Cicaplast Repair Balm",
        brand: "La Roche-Posay",
        category: "balm",
        tags: &["soothing", "centella", "barrier_repair"],
        key_ingredients: &["panthenol", "madecassoside"],
        harmful: &[],
        warnings: &[],
    },
    DemoProduct {
        id: 10,
        name: "Daily Mineral Sunscreen",
        brand: "Avene",
        category: "sunscreen",
        tags: &["sun_protection", "sensitive_care", "moisturizing"],
        key_ingredients: &["zinc_oxide"],
        harmful: &[],
        warnings: &[],
    },
];

/// Catalog bundled with the binary for local runs and the `recommend` command.
pub(crate) fn demo_catalog() -> InMemoryCatalog {
    let catalog = InMemoryCatalog::new();
    for product in DEMO_PRODUCTS {
        let id = CandidateId(product.id);
        catalog.insert(Candidate {
            id,
            name: product.name.to_string(),
            brand: product.brand.to_string(),
            category: product.category.to_string(),
            tags: product.tags.iter().map(|tag| tag.to_string()).collect::<BTreeSet<_>>(),
            attributes: BTreeMap::new(),
        });
        catalog.insert_analysis(IngredientAnalysis {
            candidate_id: id,
            beneficial_effects: product
                .key_ingredients
                .iter()
                .map(|ingredient| IngredientEffect::beneficial(ingredient, "primary active", 0.8))
                .collect(),
            harmful_effects: product
                .harmful
                .iter()
                .map(|(ingredient, effect, confidence)| {
                    IngredientEffect::harmful(ingredient, effect, *confidence)
                })
                .collect(),
            safety_warnings: product.warnings.iter().map(|w| w.to_string()).collect(),
            key_ingredients: product.key_ingredients.iter().map(|k| k.to_string()).collect(),
            ..IngredientAnalysis::empty(id)
        });
    }
    catalog
}

/// Wires rules, cache, scheduler and the demo catalog into an initialized service.
/// Must run inside a tokio runtime.
pub(crate) fn build_service(config: &AppConfig) -> Result<Arc<RecommendationService>, AppError> {
    let catalog = Arc::new(demo_catalog());
    let profiles = Arc::new(MatcherProfileProvider::new(Arc::clone(&catalog)));
    let rules = Arc::new(RuleStore::from_config(config.rules.clone()));
    let cache = Arc::new(MultiLevelCache::in_memory(&config.cache));
    let scheduler = Arc::new(TaskScheduler::new(config.scheduler.clone()));

    let service = RecommendationService::new(config.pipeline.clone(), rules, catalog, profiles)
        .with_cache(cache)
        .with_scheduler(scheduler);
    service.init()?;
    Ok(Arc::new(service))
}
