use std::sync::Arc;

use async_trait::async_trait;

use super::domain::{
    Candidate, CandidateFilters, CandidateId, IngredientAnalysis, ProfileMatch, UserProfile,
};
use super::profile::ProfileMatcher;

/// Source of candidate products and their ingredient analyses.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn candidates(
        &self,
        intent_tags: &[String],
        filters: &CandidateFilters,
    ) -> Result<Vec<Candidate>, ProviderError>;

    async fn candidate(&self, id: CandidateId) -> Result<Option<Candidate>, ProviderError>;

    /// `Ok(None)` when the catalog holds no analysis for the candidate.
    async fn ingredient_analysis(
        &self,
        id: CandidateId,
    ) -> Result<Option<IngredientAnalysis>, ProviderError>;
}

/// Source of per-(candidate, profile) compatibility.
#[async_trait]
pub trait ProfileProvider: Send + Sync {
    async fn profile_match(
        &self,
        id: CandidateId,
        profile: &UserProfile,
    ) -> Result<ProfileMatch, ProviderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("candidate {0} not found")]
    NotFound(CandidateId),
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

/// Profile provider that derives matches from catalog analyses through [`ProfileMatcher`].
pub struct MatcherProfileProvider<C> {
    catalog: Arc<C>,
    matcher: ProfileMatcher,
}

impl<C> MatcherProfileProvider<C>
where
    C: CatalogProvider + 'static,
{
    pub fn new(catalog: Arc<C>) -> Self {
        Self {
            catalog,
            matcher: ProfileMatcher::new(),
        }
    }
}

#[async_trait]
impl<C> ProfileProvider for MatcherProfileProvider<C>
where
    C: CatalogProvider + 'static,
{
    async fn profile_match(
        &self,
        id: CandidateId,
        profile: &UserProfile,
    ) -> Result<ProfileMatch, ProviderError> {
        let candidate = self
            .catalog
            .candidate(id)
            .await?
            .ok_or(ProviderError::NotFound(id))?;
        let analysis = self
            .catalog
            .ingredient_analysis(id)
            .await?
            .unwrap_or_else(|| IngredientAnalysis::empty(id));
        Ok(self.matcher.evaluate(&candidate, &analysis, profile))
    }
}
