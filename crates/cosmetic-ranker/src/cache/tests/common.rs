use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::keys::glob_match;
use crate::cache::{
    CacheError, MemoryBackend, MemoryCacheConfig, RemoteBackend, RemoteCacheConnection,
    RemoteValue,
};
use crate::scheduler::{ConnectionFactory, ConnectionPool, PoolConfig, PoolError};

pub(super) fn memory(max_entries: usize) -> MemoryBackend {
    MemoryBackend::new(MemoryCacheConfig {
        max_entries,
        max_memory_bytes: 1024 * 1024,
    })
}

pub(super) fn tags(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

pub(super) fn bytes(value: &str) -> Arc<[u8]> {
    value.as_bytes().into()
}

/// In-process stand-in for a remote key/value server.
#[derive(Default)]
pub(super) struct FakeServer {
    values: Mutex<HashMap<String, RemoteValue>>,
    tags: Mutex<HashMap<String, BTreeSet<String>>>,
    pub(super) failing: AtomicBool,
}

impl FakeServer {
    pub(super) fn contains(&self, key: &str) -> bool {
        self.values.lock().unwrap().contains_key(key)
    }

    pub(super) fn insert(&self, key: &str, value: &str, ttl: Duration, tags: &[String]) {
        self.values.lock().unwrap().insert(
            key.to_string(),
            RemoteValue {
                bytes: value.as_bytes().to_vec(),
                ttl,
                tags: tags.to_vec(),
            },
        );
        for tag in tags {
            self.tags
                .lock()
                .unwrap()
                .entry(tag.clone())
                .or_default()
                .insert(key.to_string());
        }
    }

    fn check(&self) -> Result<(), CacheError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(CacheError::Unavailable("connection reset".to_string()))
        } else {
            Ok(())
        }
    }
}

pub(super) struct FakeConnection {
    server: Arc<FakeServer>,
}

#[async_trait]
impl RemoteCacheConnection for FakeConnection {
    async fn get(&mut self, key: &str) -> Result<Option<RemoteValue>, CacheError> {
        self.server.check()?;
        Ok(self.server.values.lock().unwrap().get(key).cloned())
    }

    async fn set(&mut self, key: &str, value: RemoteValue) -> Result<(), CacheError> {
        self.server.check()?;
        self.server
            .values
            .lock()
            .unwrap()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&mut self, keys: &[String]) -> Result<usize, CacheError> {
        self.server.check()?;
        let mut values = self.server.values.lock().unwrap();
        Ok(keys.iter().filter(|key| values.remove(*key).is_some()).count())
    }

    async fn add_to_tag(&mut self, tag: &str, key: &str) -> Result<(), CacheError> {
        self.server.check()?;
        self.server
            .tags
            .lock()
            .unwrap()
            .entry(tag.to_string())
            .or_default()
            .insert(key.to_string());
        Ok(())
    }

    async fn tag_members(&mut self, tag: &str) -> Result<Vec<String>, CacheError> {
        self.server.check()?;
        let tags = self.server.tags.lock().unwrap();
        Ok(tags
            .get(tag)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn drop_tag(&mut self, tag: &str) -> Result<(), CacheError> {
        self.server.check()?;
        self.server.tags.lock().unwrap().remove(tag);
        Ok(())
    }

    async fn scan(&mut self, pattern: &str) -> Result<Vec<String>, CacheError> {
        self.server.check()?;
        let values = self.server.values.lock().unwrap();
        Ok(values
            .keys()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect())
    }

    async fn flush(&mut self) -> Result<usize, CacheError> {
        self.server.check()?;
        self.server.tags.lock().unwrap().clear();
        let mut values = self.server.values.lock().unwrap();
        let removed = values.len();
        values.clear();
        Ok(removed)
    }
}

pub(super) struct FakeFactory {
    pub(super) server: Arc<FakeServer>,
}

#[async_trait]
impl ConnectionFactory for FakeFactory {
    type Connection = FakeConnection;

    async fn connect(&self) -> Result<FakeConnection, PoolError> {
        Ok(FakeConnection {
            server: Arc::clone(&self.server),
        })
    }
}

pub(super) fn remote(server: &Arc<FakeServer>) -> RemoteBackend<FakeFactory> {
    let pool = ConnectionPool::new(
        FakeFactory {
            server: Arc::clone(server),
        },
        PoolConfig {
            min_size: 0,
            max_size: 2,
            acquire_timeout: Duration::from_millis(200),
            ..PoolConfig::default()
        },
    );
    RemoteBackend::new("remote", Arc::new(pool))
}
