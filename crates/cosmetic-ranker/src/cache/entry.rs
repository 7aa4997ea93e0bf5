use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

/// Stored value plus its bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub value: Arc<[u8]>,
    pub created_at: Instant,
    pub last_accessed_at: Instant,
    pub access_count: u64,
    pub ttl: Duration,
    pub tags: BTreeSet<String>,
}

impl CacheEntry {
    pub fn new(key: &str, value: Arc<[u8]>, ttl: Duration, tags: &[String], now: Instant) -> Self {
        Self {
            key: key.to_string(),
            value,
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
            ttl,
            tags: tags.iter().cloned().collect(),
        }
    }

    /// Visible iff `now < created_at + ttl`.
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.created_at + self.ttl
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        (self.created_at + self.ttl).saturating_duration_since(now)
    }

    pub fn size(&self) -> usize {
        self.key.len() + self.value.len()
    }

    pub(crate) fn touch(&mut self, now: Instant) {
        self.last_accessed_at = now;
        self.access_count += 1;
    }
}
