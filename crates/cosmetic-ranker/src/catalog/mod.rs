//! Catalog-side data shapes and the provider seams the core reads through.

pub mod domain;
pub mod memory;
pub mod profile;
pub mod provider;

#[cfg(test)]
mod tests;

pub use domain::{
    Candidate, CandidateFilters, CandidateId, IngredientAnalysis, IngredientEffect, MatchLevel,
    ProfileMatch, UserPreferences, UserProfile,
};
pub use memory::InMemoryCatalog;
pub use profile::ProfileMatcher;
pub use provider::{CatalogProvider, MatcherProfileProvider, ProfileProvider, ProviderError};
