use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::store::RuleError;

/// Rule as it appears in a source, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleRecord {
    pub rule_id: Option<String>,
    pub rule_type: Option<String>,
    pub med_code: Option<String>,
    pub ingredient_tag: Option<String>,
    /// Object, or a string holding a JSON object.
    pub condition_json: Option<Value>,
    pub action: Option<String>,
    pub weight: Option<i64>,
    pub severity: Option<String>,
    #[serde(alias = "rationale_ko")]
    pub rationale: Option<String>,
    /// String, or a list whose first entry is used.
    pub citation_url: Option<Value>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasRecord {
    pub alias_code: String,
    pub resolved_codes: Vec<String>,
}

/// A complete ruleset as read from a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDocument {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub rules: Vec<RuleRecord>,
    #[serde(default)]
    pub aliases: Vec<AliasRecord>,
}

fn default_version() -> String {
    "unversioned".to_string()
}

/// Pluggable origin of rule documents.
pub trait RuleSource: Send + Sync {
    fn describe(&self) -> String;
    fn load(&self) -> Result<RuleDocument, RuleError>;
}

/// `{version, rules, aliases}` JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileRuleSource {
    path: PathBuf,
}

impl JsonFileRuleSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RuleSource for JsonFileRuleSource {
    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }

    fn load(&self) -> Result<RuleDocument, RuleError> {
        let raw = fs::read_to_string(&self.path).map_err(|source| RuleError::Io {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| RuleError::Json {
            path: self.path.clone(),
            source,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CsvRuleRow {
    rule_id: Option<String>,
    rule_type: Option<String>,
    med_code: Option<String>,
    ingredient_tag: Option<String>,
    condition_json: Option<String>,
    action: Option<String>,
    weight: Option<i64>,
    severity: Option<String>,
    #[serde(alias = "rationale_ko")]
    rationale: Option<String>,
    citation_url: Option<String>,
    active: Option<String>,
}

impl CsvRuleRow {
    fn into_record(self) -> RuleRecord {
        let active = self
            .active
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| !matches!(value.to_ascii_lowercase().as_str(), "false" | "0" | "no"));
        RuleRecord {
            rule_id: non_empty(self.rule_id),
            rule_type: non_empty(self.rule_type),
            med_code: non_empty(self.med_code),
            ingredient_tag: non_empty(self.ingredient_tag),
            condition_json: non_empty(self.condition_json).map(Value::String),
            action: non_empty(self.action),
            weight: self.weight,
            severity: non_empty(self.severity),
            rationale: non_empty(self.rationale),
            citation_url: non_empty(self.citation_url).map(Value::String),
            active,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// Tabular export with one rule per row. Aliases are supplied separately.
#[derive(Debug, Clone)]
pub struct CsvFileRuleSource {
    path: PathBuf,
    aliases: Vec<AliasRecord>,
}

impl CsvFileRuleSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            aliases: builtin_aliases(),
        }
    }

    pub fn with_aliases(mut self, aliases: Vec<AliasRecord>) -> Self {
        self.aliases = aliases;
        self
    }

    fn read_rows(path: &Path) -> Result<Vec<RuleRecord>, csv::Error> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
        let mut records = Vec::new();
        for row in reader.deserialize::<CsvRuleRow>() {
            records.push(row?.into_record());
        }
        Ok(records)
    }
}

impl RuleSource for CsvFileRuleSource {
    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }

    fn load(&self) -> Result<RuleDocument, RuleError> {
        let rules = Self::read_rows(&self.path).map_err(|source| RuleError::Csv {
            path: self.path.clone(),
            source,
        })?;
        let version = self
            .path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(default_version);
        Ok(RuleDocument {
            version,
            rules,
            aliases: self.aliases.clone(),
        })
    }
}

/// In-memory document, used for the bundled defaults and in tests.
#[derive(Debug, Clone)]
pub struct StaticRuleSource {
    document: RuleDocument,
}

impl StaticRuleSource {
    pub fn new(document: RuleDocument) -> Self {
        Self { document }
    }

    pub fn builtin() -> Self {
        Self::new(builtin_document())
    }
}

impl RuleSource for StaticRuleSource {
    fn describe(&self) -> String {
        format!("static:{}", self.document.version)
    }

    fn load(&self) -> Result<RuleDocument, RuleError> {
        Ok(self.document.clone())
    }
}

fn record(
    rule_id: &str,
    rule_type: &str,
    med_code: Option<&str>,
    ingredient_tag: Option<&str>,
    condition: Value,
    weight: i64,
    rationale: &str,
) -> RuleRecord {
    let action = if rule_type == "eligibility" {
        "exclude"
    } else {
        "penalize"
    };
    RuleRecord {
        rule_id: Some(rule_id.to_string()),
        rule_type: Some(rule_type.to_string()),
        med_code: med_code.map(str::to_string),
        ingredient_tag: ingredient_tag.map(str::to_string),
        condition_json: Some(condition),
        action: Some(action.to_string()),
        weight: Some(weight),
        severity: None,
        rationale: Some(rationale.to_string()),
        citation_url: None,
        active: Some(true),
    }
}

pub(crate) fn builtin_aliases() -> Vec<AliasRecord> {
    let alias = |code: &str, codes: [&str; 3]| AliasRecord {
        alias_code: code.to_string(),
        resolved_codes: codes.iter().map(|c| c.to_string()).collect(),
    };
    vec![
        alias("MULTI:ANTICOAG", ["B01AA03", "B01AB01", "B01AC04"]),
        alias("MULTI:HTN", ["C09AA01", "C08CA01", "C03AA03"]),
        alias("MULTI:DM", ["A10BA02", "A10BB01", "A10BF01"]),
        alias("MULTI:STEROID", ["H02AB02", "H02AB04", "H02AB06"]),
    ]
}

/// Bundled ruleset used when no rule file is configured.
pub fn builtin_document() -> RuleDocument {
    RuleDocument {
        version: "builtin-1".to_string(),
        rules: vec![
            record(
                "ELG_001",
                "eligibility",
                Some("B01AA03"),
                Some("aha"),
                json!({ "leave_on": true }),
                0,
                "leave-on AHA raises bleeding and irritation risk with warfarin",
            ),
            record(
                "ELG_002",
                "eligibility",
                None,
                Some("retinoid"),
                json!({ "preg_lact": true }),
                0,
                "retinoids are contraindicated during pregnancy or lactation",
            ),
            record(
                "SCR_001",
                "penalty",
                Some("B01AA03"),
                Some("bha"),
                json!({}),
                15,
                "BHA may increase bruising risk with warfarin",
            ),
            record(
                "SCR_002",
                "penalty",
                Some("H02AB"),
                Some("vitamin_c"),
                json!({ "day_use": true }),
                10,
                "daytime vitamin C on steroid-thinned skin raises sensitivity",
            ),
        ],
        aliases: builtin_aliases(),
    }
}
