use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::backend::{CacheBackend, CacheStats};
use super::memory::{MemoryBackend, MemoryCacheConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub memory: MemoryCacheConfig,
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory: MemoryCacheConfig::default(),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Ordered cache levels, fastest first.
pub struct MultiLevelCache {
    levels: Vec<Arc<dyn CacheBackend>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl MultiLevelCache {
    pub fn new(levels: Vec<Arc<dyn CacheBackend>>) -> Self {
        Self {
            levels,
            sweeper: Mutex::new(None),
        }
    }

    pub fn in_memory(config: &CacheConfig) -> Self {
        Self::new(vec![Arc::new(MemoryBackend::new(config.memory.clone()))])
    }

    pub fn levels(&self) -> usize {
        self.levels.len()
    }

    /// Starts the background sweeper. Calling it twice replaces the previous task.
    pub fn init(self: &Arc<Self>, sweep_interval: Duration) {
        let cache: Weak<Self> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let swept = cache.sweep_expired().await;
                if swept > 0 {
                    debug!(swept, "expired cache entries removed");
                }
            }
        });
        let previous = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
        info!(levels = self.levels.len(), ?sweep_interval, "cache initialized");
    }

    /// Stops the sweeper and drops every entry.
    pub async fn close(&self) {
        let sweeper = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sweeper) = sweeper {
            sweeper.abort();
        }
        let cleared = self.clear().await;
        info!(cleared, "cache closed");
    }

    /// Looks up `key` level by level; a backend error counts as a miss on that level.
    pub async fn get(&self, key: &str) -> Option<Arc<[u8]>> {
        for (depth, level) in self.levels.iter().enumerate() {
            match level.get(key).await {
                Ok(Some(found)) => {
                    for faster in &self.levels[..depth] {
                        let promoted = faster
                            .set(
                                key,
                                Arc::clone(&found.bytes),
                                found.remaining_ttl,
                                &found.tags,
                            )
                            .await;
                        if let Err(err) = promoted {
                            warn!(backend = faster.name(), key, error = %err, "cache promotion failed");
                        }
                    }
                    return Some(found.bytes);
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(backend = level.name(), key, error = %err, "cache lookup failed");
                }
            }
        }
        None
    }

    /// Writes to every level; true when at least one level stored the value.
    pub async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration, tags: &[String]) -> bool {
        let value: Arc<[u8]> = value.into();
        let mut stored = false;
        for level in &self.levels {
            match level.set(key, Arc::clone(&value), ttl, tags).await {
                Ok(accepted) => stored |= accepted,
                Err(err) => {
                    warn!(backend = level.name(), key, error = %err, "cache write failed");
                }
            }
        }
        stored
    }

    pub async fn delete(&self, key: &str) -> bool {
        let mut deleted = false;
        for level in &self.levels {
            match level.delete(key).await {
                Ok(removed) => deleted |= removed,
                Err(err) => warn!(backend = level.name(), key, error = %err, "cache delete failed"),
            }
        }
        deleted
    }

    /// Invalidates on every level and reports the largest per-level count.
    pub async fn invalidate_by_tags(&self, tags: &[String]) -> usize {
        let mut removed = 0;
        for level in &self.levels {
            match level.invalidate_by_tags(tags).await {
                Ok(count) => removed = removed.max(count),
                Err(err) => {
                    warn!(backend = level.name(), ?tags, error = %err, "tag invalidation failed");
                }
            }
        }
        if removed > 0 {
            info!(?tags, removed, "cache entries invalidated by tag");
        }
        removed
    }

    pub async fn invalidate_by_pattern(&self, pattern: &str) -> usize {
        let mut removed = 0;
        for level in &self.levels {
            match level.invalidate_by_pattern(pattern).await {
                Ok(count) => removed = removed.max(count),
                Err(err) => {
                    warn!(backend = level.name(), pattern, error = %err, "pattern invalidation failed");
                }
            }
        }
        removed
    }

    pub async fn clear(&self) -> usize {
        let mut removed = 0;
        for level in &self.levels {
            match level.clear().await {
                Ok(count) => removed = removed.max(count),
                Err(err) => warn!(backend = level.name(), error = %err, "cache clear failed"),
            }
        }
        removed
    }

    pub async fn sweep_expired(&self) -> usize {
        let mut swept = 0;
        for level in &self.levels {
            match level.sweep_expired().await {
                Ok(count) => swept += count,
                Err(err) => warn!(backend = level.name(), error = %err, "cache sweep failed"),
            }
        }
        swept
    }

    pub async fn stats(&self) -> Vec<CacheStats> {
        let mut stats = Vec::with_capacity(self.levels.len());
        for level in &self.levels {
            stats.push(level.stats().await);
        }
        stats
    }

    /// Decodes a JSON value. Undecodable entries are dropped and reported as misses.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.get(key).await?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, error = %err, "discarding undecodable cache entry");
                self.delete(key).await;
                None
            }
        }
    }

    pub async fn set_json<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
        tags: &[String],
    ) -> bool {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.set(key, bytes, ttl, tags).await,
            Err(err) => {
                warn!(key, error = %err, "cache value could not be encoded");
                false
            }
        }
    }
}

impl Drop for MultiLevelCache {
    fn drop(&mut self) {
        if let Some(sweeper) = self
            .sweeper
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            sweeper.abort();
        }
    }
}
