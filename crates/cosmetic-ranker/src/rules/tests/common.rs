use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use serde_json::{json, Value};

use crate::rules::source::{builtin_document, RuleDocument, RuleRecord, RuleSource};
use crate::rules::RuleError;

pub(super) fn record(
    id: &str,
    rule_type: &str,
    med: Option<&str>,
    tag: Option<&str>,
) -> RuleRecord {
    let action = if rule_type == "eligibility" {
        "exclude"
    } else {
        "penalize"
    };
    RuleRecord {
        rule_id: Some(id.to_string()),
        rule_type: Some(rule_type.to_string()),
        med_code: med.map(str::to_string),
        ingredient_tag: tag.map(str::to_string),
        condition_json: Some(json!({})),
        action: Some(action.to_string()),
        weight: Some(if rule_type == "eligibility" { 0 } else { 10 }),
        severity: None,
        rationale: Some("test rationale".to_string()),
        citation_url: None,
        active: Some(true),
    }
}

pub(super) fn with_condition(mut record: RuleRecord, condition: Value) -> RuleRecord {
    record.condition_json = Some(condition);
    record
}

pub(super) fn document(rules: Vec<RuleRecord>) -> RuleDocument {
    RuleDocument {
        version: "test-1".to_string(),
        rules,
        aliases: builtin_document().aliases,
    }
}

pub(super) fn tags(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|value| value.to_string()).collect()
}

pub(super) fn temp_path(name: &str) -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "cosmetic-ranker-{}-{n}-{name}",
        std::process::id()
    ))
}

/// Source whose contents and availability tests control.
pub(super) struct SwitchableSource {
    pub(super) document: Mutex<RuleDocument>,
    pub(super) failing: AtomicBool,
    pub(super) loads: AtomicUsize,
}

impl SwitchableSource {
    pub(super) fn new(document: RuleDocument) -> Self {
        Self {
            document: Mutex::new(document),
            failing: AtomicBool::new(false),
            loads: AtomicUsize::new(0),
        }
    }

    pub(super) fn replace(&self, document: RuleDocument) {
        *self.document.lock().expect("document mutex poisoned") = document;
    }
}

impl RuleSource for SwitchableSource {
    fn describe(&self) -> String {
        "switchable".to_string()
    }

    fn load(&self) -> Result<RuleDocument, RuleError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(RuleError::Io {
                path: PathBuf::from("switchable"),
                source: std::io::Error::new(std::io::ErrorKind::Other, "source offline"),
            });
        }
        Ok(self.document.lock().expect("document mutex poisoned").clone())
    }
}
