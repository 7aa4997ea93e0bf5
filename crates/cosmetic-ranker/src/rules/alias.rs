use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::model::MedicationAlias;

/// Normalizes `"B01AA03 (warfarin)"` to `"B01AA03"`.
pub fn normalize_med_code(raw: &str) -> String {
    let code = match raw.find('(') {
        Some(index) => &raw[..index],
        None => raw,
    };
    code.trim().to_ascii_uppercase()
}

/// Lookup table from compound codes to the concrete codes they cover.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl AliasTable {
    pub fn new(aliases: impl IntoIterator<Item = MedicationAlias>) -> Self {
        let mut entries: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for alias in aliases {
            entries
                .entry(normalize_med_code(&alias.alias_code))
                .or_default()
                .extend(alias.resolved_codes.iter().map(|code| normalize_med_code(code)));
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn aliases(&self) -> Vec<MedicationAlias> {
        self.entries
            .iter()
            .map(|(alias_code, codes)| MedicationAlias {
                alias_code: alias_code.clone(),
                resolved_codes: codes.clone(),
            })
            .collect()
    }

    /// The code itself plus every concrete code it expands to. Codes without an alias entry
    /// resolve to themselves.
    pub fn resolve(&self, code: &str) -> BTreeSet<String> {
        let normalized = normalize_med_code(code);
        let mut resolved = BTreeSet::new();
        if normalized.is_empty() {
            return resolved;
        }
        match self.entries.get(&normalized) {
            Some(codes) => resolved.extend(codes.iter().cloned()),
            None if normalized.starts_with("MULTI:") => {
                debug!(code = %normalized, "unknown medication alias resolves to itself");
            }
            None => {}
        }
        resolved.insert(normalized);
        resolved
    }

    pub fn resolve_codes<S: AsRef<str>>(&self, codes: &[S]) -> BTreeSet<String> {
        codes
            .iter()
            .flat_map(|code| self.resolve(code.as_ref()))
            .collect()
    }
}
