use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::alias::AliasTable;
use super::loader::compile;
use super::model::{MedicationAlias, Rule, RuleKind};
use super::source::{
    CsvFileRuleSource, JsonFileRuleSource, RuleDocument, RuleSource, StaticRuleSource,
};
use super::validation::{validate_document, RuleStatistics, ValidationReport};

/// How a rule's medication and tag criteria combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchMode {
    /// Either criterion matching is enough.
    #[default]
    Any,
    /// Every criterion the rule sets must match.
    All,
}

impl MatchMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "any" | "or" => Some(MatchMode::Any),
            "all" | "and" => Some(MatchMode::All),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuleStoreConfig {
    /// JSON or CSV rule file. Bundled defaults when absent.
    pub source_path: Option<PathBuf>,
    pub ttl: Duration,
    pub match_mode: MatchMode,
}

impl Default for RuleStoreConfig {
    fn default() -> Self {
        Self {
            source_path: None,
            ttl: Duration::from_secs(300),
            match_mode: MatchMode::Any,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("failed to read rules from {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse rule document {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to parse rule table {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },
    #[error("ruleset rejected: {}", .0.summary())]
    Invalid(ValidationReport),
    #[error("rule '{rule_id}' is malformed: {reason}")]
    Malformed { rule_id: String, reason: String },
    #[error("no ruleset has been loaded")]
    NotLoaded,
}

/// Immutable view of one loaded ruleset.
#[derive(Debug, Clone)]
pub struct RuleSnapshot {
    pub version: String,
    pub loaded_at: DateTime<Utc>,
    pub match_mode: MatchMode,
    rules: Vec<Rule>,
    aliases: AliasTable,
    report: ValidationReport,
}

impl RuleSnapshot {
    /// Compiles a document directly, bypassing any store.
    pub fn from_document(
        document: RuleDocument,
        match_mode: MatchMode,
    ) -> Result<Self, RuleError> {
        let compiled = compile(document)?;
        Ok(Self {
            version: compiled.version,
            loaded_at: Utc::now(),
            match_mode,
            rules: compiled.rules,
            aliases: compiled.aliases,
            report: compiled.report,
        })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Warnings raised while the ruleset was validated.
    pub fn report(&self) -> &ValidationReport {
        &self.report
    }

    pub fn active_rules(&self, kind: RuleKind) -> impl Iterator<Item = &Rule> {
        self.rules
            .iter()
            .filter(move |rule| rule.active && rule.kind == kind)
    }

    pub fn resolve_codes<S: AsRef<str>>(&self, codes: &[S]) -> BTreeSet<String> {
        self.aliases.resolve_codes(codes)
    }

    /// Active rules of `kind` that apply to a candidate with `tags`.
    pub fn applicable(
        &self,
        kind: RuleKind,
        resolved_codes: &BTreeSet<String>,
        tags: &BTreeSet<String>,
    ) -> Vec<&Rule> {
        applicable_rules(
            self.active_rules(kind),
            resolved_codes,
            tags,
            self.match_mode,
        )
    }

    pub fn statistics(&self) -> RuleStatistics {
        RuleStatistics {
            version: self.version.clone(),
            loaded_at: self.loaded_at,
            total_rules: self.rules.len(),
            active_rules: self.rules.iter().filter(|rule| rule.active).count(),
            eligibility_rules: self.rules.iter().filter(|rule| rule.is_eligibility()).count(),
            penalty_rules: self.rules.iter().filter(|rule| rule.is_penalty()).count(),
            aliases: self.aliases.len(),
        }
    }
}

fn tag_matches(rule_tag: &str, tags: &BTreeSet<String>) -> bool {
    let rule_tag = rule_tag.trim().to_lowercase();
    !rule_tag.is_empty()
        && tags
            .iter()
            .any(|tag| tag.trim().to_lowercase().contains(&rule_tag))
}

/// Filters `rules` to those whose medication code is among `resolved_codes` or whose tag
/// matches a candidate tag (case-insensitive, exact or substring).
pub fn applicable_rules<'a>(
    rules: impl IntoIterator<Item = &'a Rule>,
    resolved_codes: &BTreeSet<String>,
    tags: &BTreeSet<String>,
    mode: MatchMode,
) -> Vec<&'a Rule> {
    rules
        .into_iter()
        .filter(|rule| {
            let code = rule
                .medication_code
                .as_ref()
                .map(|code| resolved_codes.contains(code));
            let tag = rule
                .ingredient_tag
                .as_ref()
                .map(|tag| tag_matches(tag, tags));
            match mode {
                MatchMode::Any => code.unwrap_or(false) || tag.unwrap_or(false),
                MatchMode::All => {
                    (code.is_some() || tag.is_some())
                        && code.unwrap_or(true)
                        && tag.unwrap_or(true)
                }
            }
        })
        .collect()
}

#[derive(Default)]
struct StoreState {
    snapshot: Option<Arc<RuleSnapshot>>,
    checked_at: Option<Instant>,
}

/// Process-wide holder of the current ruleset.
pub struct RuleStore {
    source: Arc<dyn RuleSource>,
    config: RuleStoreConfig,
    state: RwLock<StoreState>,
}

impl RuleStore {
    pub fn new(source: Arc<dyn RuleSource>, config: RuleStoreConfig) -> Self {
        Self {
            source,
            config,
            state: RwLock::new(StoreState::default()),
        }
    }

    /// Picks a source from the configured path: `.csv` tables, JSON otherwise, bundled
    /// defaults when no path is set.
    pub fn from_config(config: RuleStoreConfig) -> Self {
        let source: Arc<dyn RuleSource> = match &config.source_path {
            Some(path)
                if path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv")) =>
            {
                Arc::new(CsvFileRuleSource::new(path.clone()))
            }
            Some(path) => Arc::new(JsonFileRuleSource::new(path.clone())),
            None => Arc::new(StaticRuleSource::builtin()),
        };
        Self::new(source, config)
    }

    pub fn source_description(&self) -> String {
        self.source.describe()
    }

    /// `LoadRules`: reads and compiles the source without touching the cached snapshot.
    pub fn load_rules(&self) -> Result<(Vec<Rule>, Vec<MedicationAlias>), RuleError> {
        let compiled = compile(self.source.load()?)?;
        Ok((compiled.rules, compiled.aliases.aliases()))
    }

    /// Validates the current source contents without loading them.
    pub fn validate(&self) -> Result<ValidationReport, RuleError> {
        Ok(validate_document(&self.source.load()?))
    }

    /// Initial load. Fails when the source cannot produce a valid ruleset.
    pub fn init(&self) -> Result<Arc<RuleSnapshot>, RuleError> {
        let snapshot = self.reload()?;
        info!(
            source = %self.source.describe(),
            version = %snapshot.version,
            rules = snapshot.rules.len(),
            aliases = snapshot.aliases.len(),
            "rule store initialized"
        );
        Ok(snapshot)
    }

    /// Forces a reload. On failure the previous snapshot stays in service.
    pub fn reload(&self) -> Result<Arc<RuleSnapshot>, RuleError> {
        let result = self.build_snapshot();
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.checked_at = Some(Instant::now());
        match result {
            Ok(snapshot) => {
                for warning in &snapshot.report.warnings {
                    warn!(version = %snapshot.version, %warning, "ruleset warning");
                }
                state.snapshot = Some(snapshot.clone());
                Ok(snapshot)
            }
            Err(err) => {
                warn!(
                    error = %err,
                    serving_previous = state.snapshot.is_some(),
                    "rule reload failed"
                );
                Err(err)
            }
        }
    }

    /// Current snapshot, refreshed when older than the TTL. A failed refresh keeps serving
    /// the previous snapshot and waits another TTL before retrying.
    pub fn snapshot(&self) -> Result<Arc<RuleSnapshot>, RuleError> {
        {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            if let (Some(snapshot), Some(checked_at)) = (&state.snapshot, state.checked_at) {
                if checked_at.elapsed() < self.config.ttl {
                    return Ok(snapshot.clone());
                }
            }
        }

        debug!("rule snapshot stale, refreshing");
        match self.reload() {
            Ok(snapshot) => Ok(snapshot),
            Err(err) => {
                let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
                state.snapshot.clone().ok_or(err)
            }
        }
    }

    /// Cached snapshot without refreshing.
    pub fn current(&self) -> Option<Arc<RuleSnapshot>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot
            .clone()
    }

    pub fn close(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.snapshot = None;
        state.checked_at = None;
    }

    fn build_snapshot(&self) -> Result<Arc<RuleSnapshot>, RuleError> {
        let document = self.source.load()?;
        RuleSnapshot::from_document(document, self.config.match_mode).map(Arc::new)
    }
}
