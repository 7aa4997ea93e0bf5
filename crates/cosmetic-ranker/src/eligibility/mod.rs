//! Hard exclusion of candidates by eligibility rules.
//!
//! Exclusion is binary and fail-closed: the first matching rule excludes, and a candidate
//! whose rules cannot be evaluated is excluded with a synthetic `SYSTEM_ERROR` hit.

pub mod filter;
pub mod summary;

#[cfg(test)]
mod tests;

pub use filter::{exclusion_reason, medication_name, EligibilityFilter, EligibilityOutcome};
pub use summary::{ExclusionSummary, RuleCount};
