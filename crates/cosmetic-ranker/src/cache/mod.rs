//! Multi-level key/value cache with TTL expiry, LRU eviction, and tag invalidation.
//!
//! Levels are ordered fastest first. A hit on a slower level is copied into every faster
//! level before it is returned. Each backend serializes its own mutations; the multi-level
//! wrapper never holds two backend locks at once.

pub mod backend;
pub mod entry;
pub mod keys;
pub mod memory;
pub mod multi_level;
pub mod remote;

#[cfg(test)]
mod tests;

pub use backend::{CacheBackend, CacheError, CacheStats, CachedValue};
pub use entry::CacheEntry;
pub use keys::{stable_hash, CacheKeys};
pub use memory::{MemoryBackend, MemoryCacheConfig};
pub use multi_level::{CacheConfig, MultiLevelCache};
pub use remote::{RemoteBackend, RemoteCacheConnection, RemoteValue};
