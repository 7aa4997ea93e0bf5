use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::scheduler::pool::PoolError;

/// Value returned by a backend lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedValue {
    pub bytes: Arc<[u8]>,
    /// Time left before the entry expires.
    pub remaining_ttl: Duration,
    pub tags: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache value could not be encoded: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Counters reported by one backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub backend: String,
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub invalidations: u64,
    pub entries: usize,
    pub bytes: usize,
    pub hit_rate: f64,
}

impl CacheStats {
    pub(crate) fn with_hit_rate(mut self) -> Self {
        let lookups = self.hits + self.misses;
        self.hit_rate = if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        };
        self
    }
}

/// One cache level.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn get(&self, key: &str) -> Result<Option<CachedValue>, CacheError>;

    /// `Ok(false)` when the backend refuses the value, e.g. it exceeds the memory limit.
    async fn set(
        &self,
        key: &str,
        value: Arc<[u8]>,
        ttl: Duration,
        tags: &[String],
    ) -> Result<bool, CacheError>;

    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Removes every key registered under any of `tags`, expired or not.
    async fn invalidate_by_tags(&self, tags: &[String]) -> Result<usize, CacheError>;

    /// Removes keys matching a `*`/`?` glob.
    async fn invalidate_by_pattern(&self, pattern: &str) -> Result<usize, CacheError>;

    async fn clear(&self) -> Result<usize, CacheError>;

    /// Physically drops expired entries. Backends with native expiry return 0.
    async fn sweep_expired(&self) -> Result<usize, CacheError> {
        Ok(0)
    }

    async fn stats(&self) -> CacheStats;
}
