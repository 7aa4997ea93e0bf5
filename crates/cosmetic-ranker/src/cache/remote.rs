use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::backend::{CacheBackend, CacheError, CacheStats, CachedValue};
use crate::scheduler::pool::{ConnectionFactory, ConnectionPool, PooledConnection};

/// Value as stored by a remote cache server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteValue {
    pub bytes: Vec<u8>,
    pub ttl: Duration,
    pub tags: Vec<String>,
}

/// Operations a remote key/value server must provide. Expiry is enforced server side.
#[async_trait]
pub trait RemoteCacheConnection: Send {
    async fn get(&mut self, key: &str) -> Result<Option<RemoteValue>, CacheError>;
    async fn set(&mut self, key: &str, value: RemoteValue) -> Result<(), CacheError>;
    async fn delete(&mut self, keys: &[String]) -> Result<usize, CacheError>;
    async fn add_to_tag(&mut self, tag: &str, key: &str) -> Result<(), CacheError>;
    async fn tag_members(&mut self, tag: &str) -> Result<Vec<String>, CacheError>;
    async fn drop_tag(&mut self, tag: &str) -> Result<(), CacheError>;
    async fn scan(&mut self, pattern: &str) -> Result<Vec<String>, CacheError>;
    async fn flush(&mut self) -> Result<usize, CacheError>;
}

#[derive(Default)]
struct RemoteCounters {
    hits: u64,
    misses: u64,
    sets: u64,
    invalidations: u64,
}

/// Cache level backed by pooled connections to a remote server.
pub struct RemoteBackend<F>
where
    F: ConnectionFactory,
    F::Connection: RemoteCacheConnection,
{
    name: String,
    pool: Arc<ConnectionPool<F>>,
    counters: Mutex<RemoteCounters>,
}

impl<F> RemoteBackend<F>
where
    F: ConnectionFactory,
    F::Connection: RemoteCacheConnection,
{
    pub fn new(name: impl Into<String>, pool: Arc<ConnectionPool<F>>) -> Self {
        Self {
            name: name.into(),
            pool,
            counters: Mutex::new(RemoteCounters::default()),
        }
    }

    pub fn pool(&self) -> &ConnectionPool<F> {
        &self.pool
    }

    fn count(&self, update: impl FnOnce(&mut RemoteCounters)) {
        update(&mut self.counters.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

/// Hands the connection back, or discards it when the operation failed.
fn settle<F: ConnectionFactory, T>(
    connection: PooledConnection<F>,
    result: Result<T, CacheError>,
) -> Result<T, CacheError> {
    if result.is_err() {
        connection.discard();
    }
    result
}

#[async_trait]
impl<F> CacheBackend for RemoteBackend<F>
where
    F: ConnectionFactory,
    F::Connection: RemoteCacheConnection,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> Result<Option<CachedValue>, CacheError> {
        let mut connection = self.pool.acquire().await?;
        let result = connection.get(key).await;
        let found = settle(connection, result)?;
        let hit = found.is_some();
        self.count(|counters| {
            if hit {
                counters.hits += 1;
            } else {
                counters.misses += 1;
            }
        });
        Ok(found.map(|value| CachedValue {
            bytes: value.bytes.into(),
            remaining_ttl: value.ttl,
            tags: value.tags,
        }))
    }

    async fn set(
        &self,
        key: &str,
        value: Arc<[u8]>,
        ttl: Duration,
        tags: &[String],
    ) -> Result<bool, CacheError> {
        let mut connection = self.pool.acquire().await?;
        let stored = RemoteValue {
            bytes: value.to_vec(),
            ttl,
            tags: tags.to_vec(),
        };
        let mut result = connection.set(key, stored).await;
        for tag in tags {
            if result.is_err() {
                break;
            }
            result = connection.add_to_tag(tag, key).await;
        }
        settle(connection, result)?;
        self.count(|counters| counters.sets += 1);
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut connection = self.pool.acquire().await?;
        let result = connection.delete(&[key.to_string()]).await;
        Ok(settle(connection, result)? > 0)
    }

    async fn invalidate_by_tags(&self, tags: &[String]) -> Result<usize, CacheError> {
        let mut connection = self.pool.acquire().await?;
        let mut removed = 0;
        for tag in tags {
            let members = match connection.tag_members(tag).await {
                Ok(members) => members,
                Err(err) => return settle(connection, Err(err)),
            };
            let deleted = match connection.delete(&members).await {
                Ok(deleted) => deleted,
                Err(err) => return settle(connection, Err(err)),
            };
            if let Err(err) = connection.drop_tag(tag).await {
                return settle(connection, Err(err));
            }
            removed += deleted;
        }
        self.count(|counters| counters.invalidations += removed as u64);
        Ok(removed)
    }

    async fn invalidate_by_pattern(&self, pattern: &str) -> Result<usize, CacheError> {
        let mut connection = self.pool.acquire().await?;
        let keys = match connection.scan(pattern).await {
            Ok(keys) => keys,
            Err(err) => return settle(connection, Err(err)),
        };
        let result = connection.delete(&keys).await;
        let removed = settle(connection, result)?;
        self.count(|counters| counters.invalidations += removed as u64);
        Ok(removed)
    }

    async fn clear(&self) -> Result<usize, CacheError> {
        let mut connection = self.pool.acquire().await?;
        let result = connection.flush().await;
        settle(connection, result)
    }

    async fn stats(&self) -> CacheStats {
        let counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        CacheStats {
            backend: self.name.clone(),
            hits: counters.hits,
            misses: counters.misses,
            sets: counters.sets,
            invalidations: counters.invalidations,
            ..CacheStats::default()
        }
        .with_hit_rate()
    }
}
