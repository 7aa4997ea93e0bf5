//! Eligibility and penalty rules: loading, alias resolution, condition evaluation.
//!
//! Rulesets are compiled from a [`RuleSource`] into an immutable [`RuleSnapshot`]. The
//! [`RuleStore`] hands out `Arc` snapshots and swaps them wholesale on TTL refresh, so a
//! reader never observes a half-loaded ruleset.

pub mod alias;
pub mod condition;
mod loader;
pub mod model;
pub mod source;
pub mod store;
pub mod validation;

#[cfg(test)]
mod tests;

pub use alias::{normalize_med_code, AliasTable};
pub use condition::{evaluate_condition, ConditionError, EvaluationContext, UsageContext};
pub use model::{
    Condition, MedicationAlias, Rule, RuleAction, RuleHit, RuleId, RuleKind, Scalar, Severity,
    SYSTEM_ERROR_RULE, SYSTEM_ERROR_WEIGHT,
};
pub use source::{
    AliasRecord, CsvFileRuleSource, JsonFileRuleSource, RuleDocument, RuleRecord, RuleSource,
    StaticRuleSource,
};
pub use store::{
    applicable_rules, MatchMode, RuleError, RuleSnapshot, RuleStore, RuleStoreConfig,
};
pub use validation::{validate_document, RuleStatistics, ValidationReport};
