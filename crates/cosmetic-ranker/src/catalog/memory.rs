use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::domain::{Candidate, CandidateFilters, CandidateId, IngredientAnalysis};
use super::provider::{CatalogProvider, ProviderError};

/// Catalog held in process memory. Listing returns newest candidates first.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    candidates: RwLock<BTreeMap<CandidateId, Candidate>>,
    analyses: RwLock<HashMap<CandidateId, IngredientAnalysis>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_candidates(candidates: impl IntoIterator<Item = Candidate>) -> Self {
        let catalog = Self::new();
        for candidate in candidates {
            catalog.insert(candidate);
        }
        catalog
    }

    /// Replaces any candidate with the same id.
    pub fn insert(&self, candidate: Candidate) {
        self.candidates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(candidate.id, candidate);
    }

    pub fn insert_analysis(&self, analysis: IngredientAnalysis) {
        self.analyses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(analysis.candidate_id, analysis);
    }

    pub fn len(&self) -> usize {
        self.candidates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CatalogProvider for InMemoryCatalog {
    async fn candidates(
        &self,
        _intent_tags: &[String],
        filters: &CandidateFilters,
    ) -> Result<Vec<Candidate>, ProviderError> {
        let category = filters
            .category_like
            .as_deref()
            .map(|value| value.trim().to_lowercase())
            .filter(|value| !value.is_empty());
        let candidates = self.candidates.read().unwrap_or_else(PoisonError::into_inner);
        let matching = candidates.values().rev().filter(|candidate| match &category {
            Some(category) => candidate.category.to_lowercase().contains(category.as_str()),
            None => true,
        });
        Ok(match filters.limit {
            Some(limit) => matching.take(limit).cloned().collect(),
            None => matching.cloned().collect(),
        })
    }

    async fn candidate(&self, id: CandidateId) -> Result<Option<Candidate>, ProviderError> {
        Ok(self
            .candidates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned())
    }

    async fn ingredient_analysis(
        &self,
        id: CandidateId,
    ) -> Result<Option<IngredientAnalysis>, ProviderError> {
        Ok(self
            .analyses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned())
    }
}
