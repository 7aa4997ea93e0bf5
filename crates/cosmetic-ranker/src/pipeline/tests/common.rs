use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::{CacheConfig, MultiLevelCache};
use crate::catalog::{
    Candidate, CandidateFilters, CandidateId, CatalogProvider, InMemoryCatalog,
    IngredientAnalysis, MatcherProfileProvider, ProviderError,
};
use crate::pipeline::{PipelineConfig, RecommendationRequest, RecommendationService};
use crate::rules::{RuleStore, RuleStoreConfig, UsageContext};
use crate::scheduler::{SchedulerConfig, TaskScheduler};

pub(super) fn product(id: u64, name: &str, brand: &str, category: &str, tags: &[&str]) -> Candidate {
    Candidate {
        id: CandidateId(id),
        name: name.to_string(),
        brand: brand.to_string(),
        category: category.to_string(),
        tags: tags.iter().map(|tag| tag.to_string()).collect::<BTreeSet<_>>(),
        attributes: BTreeMap::new(),
    }
}

/// Six products: an AHA toner, a BHA toner, two creams, a vitamin C serum and a retinoid serum.
pub(super) fn catalog() -> Arc<InMemoryCatalog> {
    Arc::new(InMemoryCatalog::with_candidates([
        product(1, "Glycolic Peel Toner", "Innisfree", "toner", &["aha", "exfoliating"]),
        product(2, "BHA Pore Toner", "Cosrx", "toner", &["bha", "pore"]),
        product(3, "Water Bank Cream", "Laneige", "cream", &["hyaluronic_acid", "moisturizing"]),
        product(4, "Cicaplast Balm", "La Roche-Posay", "cream", &["centella", "soothing"]),
        product(5, "Vita C Serum", "Klairs", "serum", &["vitamin_c", "brightening"]),
        product(6, "Night Renewal Serum", "Some By Mi", "serum", &["retinoid"]),
    ]))
}

pub(super) fn service_with(config: PipelineConfig, catalog: Arc<InMemoryCatalog>) -> RecommendationService {
    let rules = Arc::new(RuleStore::from_config(RuleStoreConfig::default()));
    let profiles = Arc::new(MatcherProfileProvider::new(Arc::clone(&catalog)));
    RecommendationService::new(config, rules, catalog, profiles)
}

pub(super) fn plain_service() -> RecommendationService {
    let service = service_with(PipelineConfig::default(), catalog());
    service.init().expect("bundled rules load");
    service
}

pub(super) fn full_service() -> RecommendationService {
    let scheduler = Arc::new(TaskScheduler::new(SchedulerConfig {
        max_concurrent_tasks: 10,
        ..SchedulerConfig::default()
    }));
    let cache = Arc::new(MultiLevelCache::in_memory(&CacheConfig::default()));
    let service = service_with(PipelineConfig::default(), catalog())
        .with_cache(cache)
        .with_scheduler(scheduler);
    service.init().expect("bundled rules load");
    service
}

pub(super) fn request(intents: &[&str], medications: &[&str]) -> RecommendationRequest {
    RecommendationRequest {
        intent_tags: intents.iter().map(|intent| intent.to_string()).collect(),
        medications: medications.iter().map(|code| code.to_string()).collect(),
        usage: UsageContext {
            leave_on: true,
            face: true,
            ..UsageContext::default()
        },
        ..RecommendationRequest::default()
    }
}

pub(super) fn zero_timeout() -> PipelineConfig {
    PipelineConfig {
        request_timeout: Duration::ZERO,
        ..PipelineConfig::default()
    }
}

/// Catalog whose backing store is down.
pub(super) struct OfflineCatalog;

#[async_trait]
impl CatalogProvider for OfflineCatalog {
    async fn candidates(
        &self,
        _intent_tags: &[String],
        _filters: &CandidateFilters,
    ) -> Result<Vec<Candidate>, ProviderError> {
        Err(ProviderError::Unavailable("catalog offline".to_string()))
    }

    async fn candidate(&self, _id: CandidateId) -> Result<Option<Candidate>, ProviderError> {
        Err(ProviderError::Unavailable("catalog offline".to_string()))
    }

    async fn ingredient_analysis(
        &self,
        _id: CandidateId,
    ) -> Result<Option<IngredientAnalysis>, ProviderError> {
        Err(ProviderError::Unavailable("catalog offline".to_string()))
    }
}
