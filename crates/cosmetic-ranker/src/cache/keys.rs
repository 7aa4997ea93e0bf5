//! Cache key builders, tags, and default lifetimes.

use std::fmt::Write as _;
use std::time::Duration;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::catalog::CandidateId;

pub const RECOMMENDATION_TTL: Duration = Duration::from_secs(1800);
pub const SCORE_TTL: Duration = Duration::from_secs(3600);
pub const ANALYSIS_TTL: Duration = Duration::from_secs(7200);
pub const CANDIDATES_TTL: Duration = Duration::from_secs(600);

pub const RECOMMENDATION_TAG: &str = "recommendations";
pub const SCORE_TAG: &str = "scores";
pub const RULES_TAG: &str = "rules";
pub const CANDIDATES_TAG: &str = "candidates";

/// Hash of the canonical JSON form of `value`. Object keys serialize sorted, so two
/// requests that differ only in field order hash the same.
pub fn stable_hash<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let canonical = serde_json::to_string(&serde_json::to_value(value)?)?;
    let digest = Sha256::digest(canonical.as_bytes());
    let mut hex = String::with_capacity(32);
    for byte in digest.iter().take(16) {
        let _ = write!(hex, "{byte:02x}");
    }
    Ok(hex)
}

pub struct CacheKeys;

impl CacheKeys {
    pub fn recommendation(request_hash: &str) -> String {
        format!("rec:{request_hash}")
    }

    pub fn score(candidate: CandidateId, context_hash: &str) -> String {
        format!("score:{candidate}:{context_hash}")
    }

    pub fn analysis(candidate: CandidateId) -> String {
        format!("analysis:{candidate}")
    }

    pub fn candidates(query_hash: &str) -> String {
        format!("candidates:{query_hash}")
    }

    pub fn candidate_tag(candidate: CandidateId) -> String {
        format!("candidate:{candidate}")
    }

    pub fn ruleset_tag(version: &str) -> String {
        format!("ruleset:{version}")
    }
}

/// `*` matches any run of characters, `?` exactly one.
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    t = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|c| *c == '*')
}
