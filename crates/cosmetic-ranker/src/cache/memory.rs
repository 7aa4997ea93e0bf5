use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

use super::backend::{CacheBackend, CacheError, CacheStats, CachedValue};
use super::entry::CacheEntry;
use super::keys::glob_match;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryCacheConfig {
    pub max_entries: usize,
    pub max_memory_bytes: usize,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            max_memory_bytes: 100 * 1024 * 1024,
        }
    }
}

#[derive(Default)]
struct Counters {
    hits: u64,
    misses: u64,
    sets: u64,
    evictions: u64,
    expirations: u64,
    invalidations: u64,
}

struct Slot {
    entry: CacheEntry,
    tick: u64,
}

#[derive(Default)]
struct MemoryState {
    slots: HashMap<String, Slot>,
    /// Access order, oldest tick first.
    recency: BTreeMap<u64, String>,
    tags: HashMap<String, HashSet<String>>,
    bytes: usize,
    tick: u64,
    counters: Counters,
}

impl MemoryState {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let slot = self.slots.remove(key)?;
        self.recency.remove(&slot.tick);
        self.bytes = self.bytes.saturating_sub(slot.entry.size());
        for tag in &slot.entry.tags {
            if let Some(keys) = self.tags.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tags.remove(tag);
                }
            }
        }
        Some(slot.entry)
    }

    fn insert(&mut self, entry: CacheEntry) {
        let tick = self.next_tick();
        for tag in &entry.tags {
            self.tags
                .entry(tag.clone())
                .or_default()
                .insert(entry.key.clone());
        }
        self.bytes += entry.size();
        self.recency.insert(tick, entry.key.clone());
        self.slots.insert(entry.key.clone(), Slot { entry, tick });
    }

    fn evict_least_recent(&mut self) -> bool {
        let Some((_, key)) = self.recency.pop_first() else {
            return false;
        };
        // recency no longer holds this tick; remove() tolerates that
        self.remove(&key);
        self.counters.evictions += 1;
        true
    }
}

/// In-process LRU level bounded by entry count and total bytes.
pub struct MemoryBackend {
    name: String,
    config: MemoryCacheConfig,
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new(config: MemoryCacheConfig) -> Self {
        Self::named("memory", config)
    }

    pub fn named(name: impl Into<String>, config: MemoryCacheConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(MemoryState::default()),
        }
    }

    pub fn config(&self) -> &MemoryCacheConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> Result<Option<CachedValue>, CacheError> {
        let now = Instant::now();
        let mut state = self.lock();

        let expired = match state.slots.get(key) {
            None => {
                state.counters.misses += 1;
                return Ok(None);
            }
            Some(slot) => slot.entry.is_expired(now),
        };
        if expired {
            state.remove(key);
            state.counters.expirations += 1;
            state.counters.misses += 1;
            return Ok(None);
        }

        let tick = state.next_tick();
        let MemoryState {
            slots, recency, ..
        } = &mut *state;
        let Some(slot) = slots.get_mut(key) else {
            return Ok(None);
        };
        recency.remove(&slot.tick);
        recency.insert(tick, key.to_string());
        slot.tick = tick;
        slot.entry.touch(now);
        let value = CachedValue {
            bytes: Arc::clone(&slot.entry.value),
            remaining_ttl: slot.entry.remaining(now),
            tags: slot.entry.tags.iter().cloned().collect(),
        };
        state.counters.hits += 1;
        Ok(Some(value))
    }

    async fn set(
        &self,
        key: &str,
        value: Arc<[u8]>,
        ttl: Duration,
        tags: &[String],
    ) -> Result<bool, CacheError> {
        let entry = CacheEntry::new(key, value, ttl, tags, Instant::now());
        if entry.size() > self.config.max_memory_bytes {
            debug!(key, size = entry.size(), "value exceeds memory cache limit");
            return Ok(false);
        }

        let mut state = self.lock();
        state.remove(key);
        state.insert(entry);
        while state.slots.len() > self.config.max_entries
            || state.bytes > self.config.max_memory_bytes
        {
            if !state.evict_least_recent() {
                break;
            }
        }
        state.counters.sets += 1;
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.lock().remove(key).is_some())
    }

    async fn invalidate_by_tags(&self, tags: &[String]) -> Result<usize, CacheError> {
        let mut state = self.lock();
        let keys: HashSet<String> = tags
            .iter()
            .filter_map(|tag| state.tags.get(tag))
            .flat_map(|keys| keys.iter().cloned())
            .collect();
        let removed = keys
            .iter()
            .filter(|key| state.remove(key).is_some())
            .count();
        state.counters.invalidations += removed as u64;
        Ok(removed)
    }

    async fn invalidate_by_pattern(&self, pattern: &str) -> Result<usize, CacheError> {
        let mut state = self.lock();
        let keys: Vec<String> = state
            .slots
            .keys()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect();
        for key in &keys {
            state.remove(key);
        }
        state.counters.invalidations += keys.len() as u64;
        Ok(keys.len())
    }

    async fn clear(&self) -> Result<usize, CacheError> {
        let mut state = self.lock();
        let removed = state.slots.len();
        state.slots.clear();
        state.recency.clear();
        state.tags.clear();
        state.bytes = 0;
        Ok(removed)
    }

    async fn sweep_expired(&self) -> Result<usize, CacheError> {
        let now = Instant::now();
        let mut state = self.lock();
        let expired: Vec<String> = state
            .slots
            .values()
            .filter(|slot| slot.entry.is_expired(now))
            .map(|slot| slot.entry.key.clone())
            .collect();
        for key in &expired {
            state.remove(key);
        }
        state.counters.expirations += expired.len() as u64;
        Ok(expired.len())
    }

    async fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            backend: self.name.clone(),
            hits: state.counters.hits,
            misses: state.counters.misses,
            sets: state.counters.sets,
            evictions: state.counters.evictions,
            expirations: state.counters.expirations,
            invalidations: state.counters.invalidations,
            entries: state.slots.len(),
            bytes: state.bytes,
            hit_rate: 0.0,
        }
        .with_hit_rate()
    }
}
