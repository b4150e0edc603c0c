//! Response cache
//!
//! The proxy caches fully assembled responses keyed by the raw token path
//! segment. The cache is a capability injected into the proxy
//! ([`ResponseCache`]) so tests and alternative backends can substitute
//! their own store. [`LruResponseCache`] is the default: in memory, bounded
//! by total entry size, evicting least recently used entries first. Entries
//! never expire on their own.

use crate::models::CachedResponse;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Cache statistics for monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub total_bytes: usize,
    pub max_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Key/value store for assembled responses
///
/// Individual operations must be atomic; concurrent `set` calls for the same
/// key resolve as last write wins.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Look up a response by raw token
    async fn get(&self, key: &str) -> Option<CachedResponse>;

    /// Store a response under a raw token
    async fn set(&self, key: &str, value: CachedResponse);

    /// Current statistics
    fn stats(&self) -> CacheStats;
}

/// Cached entry with access tracking
struct CacheEntry {
    value: CachedResponse,
    size: usize,
    last_accessed: u64,
}

#[derive(Default)]
struct LruState {
    entries: HashMap<String, CacheEntry>,
    current_size_bytes: usize,
    /// Monotonic access clock; larger means more recently used
    clock: u64,
}

impl LruState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.current_size_bytes = self.current_size_bytes.saturating_sub(entry.size);
        Some(entry)
    }
}

/// In-memory response cache with a byte budget and LRU eviction
pub struct LruResponseCache {
    state: Mutex<LruState>,
    max_size_bytes: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl LruResponseCache {
    /// Create a new LruResponseCache
    ///
    /// # Arguments
    /// * `max_size_bytes` - Upper bound on the summed size of all entries
    pub fn new(max_size_bytes: usize) -> Self {
        LruResponseCache {
            state: Mutex::new(LruState::default()),
            max_size_bytes,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Evict least recently used entries until `needed_bytes` more fit
    fn evict_lru(&self, state: &mut LruState, needed_bytes: usize) {
        let mut entries: Vec<_> = state
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.last_accessed))
            .collect();

        entries.sort_by_key(|(_, last_accessed)| *last_accessed);

        let mut removed = 0u64;
        for (key, _) in entries {
            if state.current_size_bytes + needed_bytes <= self.max_size_bytes {
                break;
            }
            if state.remove(&key).is_some() {
                removed += 1;
            }
        }

        self.evictions.fetch_add(removed, Ordering::Relaxed);
        debug!(
            "LRU eviction: removed {} entries, {} bytes in use",
            removed, state.current_size_bytes
        );
    }
}

#[async_trait]
impl ResponseCache for LruResponseCache {
    async fn get(&self, key: &str) -> Option<CachedResponse> {
        let result = match self.state.lock() {
            Ok(mut state) => {
                let now = state.tick();
                state.entries.get_mut(key).map(|entry| {
                    entry.last_accessed = now;
                    entry.value.clone()
                })
            }
            Err(e) => {
                warn!("Cache lookup error: key={}, error={}", key, e);
                None
            }
        };

        if result.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Cache hit: key={}", key);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!("Cache miss: key={}", key);
        }

        result
    }

    async fn set(&self, key: &str, value: CachedResponse) {
        let size = value.size();
        if size > self.max_size_bytes {
            debug!(
                "Not caching key={}: entry of {} bytes exceeds cache size {}",
                key, size, self.max_size_bytes
            );
            return;
        }

        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(e) => {
                warn!("Failed to store response in cache: key={}, error={}", key, e);
                return;
            }
        };

        state.remove(key);

        if state.current_size_bytes + size > self.max_size_bytes {
            debug!(
                "Cache size limit reached ({}/{}), evicting LRU entries",
                state.current_size_bytes, self.max_size_bytes
            );
            self.evict_lru(&mut state, size);
        }

        let now = state.tick();
        state.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                size,
                last_accessed: now,
            },
        );
        state.current_size_bytes += size;

        debug!("Stored response in cache: key={}, size={}", key, size);
    }

    fn stats(&self) -> CacheStats {
        let (total_entries, total_bytes) = match self.state.lock() {
            Ok(state) => (state.entries.len(), state.current_size_bytes),
            Err(_) => (0, 0),
        };

        CacheStats {
            total_entries,
            total_bytes,
            max_bytes: self.max_size_bytes,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Cache that stores nothing, used when caching is disabled
#[derive(Debug, Default)]
pub struct NoopCache;

#[async_trait]
impl ResponseCache for NoopCache {
    async fn get(&self, _key: &str) -> Option<CachedResponse> {
        None
    }

    async fn set(&self, _key: &str, _value: CachedResponse) {}

    fn stats(&self) -> CacheStats {
        CacheStats::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn response(len: usize) -> CachedResponse {
        CachedResponse::new(Bytes::from(vec![0u8; len]), "", Vec::new())
    }

    #[tokio::test]
    async fn test_cache_miss() {
        let cache = LruResponseCache::new(1024);
        assert!(cache.get("missing").await.is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_store_and_lookup() {
        let cache = LruResponseCache::new(1024);
        let value = CachedResponse::new(
            Bytes::from_static(b"#EXTM3U"),
            "application/vnd.apple.mpegurl",
            vec![("Cache-Control".to_string(), "public, max-age=3600".to_string())],
        );

        cache.set("token", value.clone()).await;

        assert_eq!(cache.get("token").await, Some(value));
        let stats = cache.stats();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.hits, 1);
    }

    #[tokio::test]
    async fn test_suffix_is_part_of_key() {
        let cache = LruResponseCache::new(1024);
        cache.set("abc.m3u8", response(4)).await;
        assert!(cache.get("abc").await.is_none());
        assert!(cache.get("abc.m3u8").await.is_some());
    }

    #[tokio::test]
    async fn test_overwrite_updates_size() {
        let cache = LruResponseCache::new(1024);
        cache.set("k", response(100)).await;
        cache.set("k", response(10)).await;
        let stats = cache.stats();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.total_bytes, 10);
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let cache = LruResponseCache::new(1024);

        cache.set("a", response(512)).await;
        cache.set("b", response(512)).await;

        // Touch "a" so that "b" becomes least recently used
        assert!(cache.get("a").await.is_some());

        cache.set("c", response(512)).await;

        assert!(cache.get("a").await.is_some());
        assert!(cache.get("b").await.is_none());
        assert!(cache.get("c").await.is_some());

        let stats = cache.stats();
        assert_eq!(stats.total_bytes, 1024);
        assert_eq!(stats.evictions, 1);
    }

    #[tokio::test]
    async fn test_oversized_entry_not_stored() {
        let cache = LruResponseCache::new(100);
        cache.set("big", response(101)).await;
        assert!(cache.get("big").await.is_none());
        assert_eq!(cache.stats().total_entries, 0);
    }

    #[tokio::test]
    async fn test_noop_cache() {
        let cache = NoopCache;
        cache.set("k", response(1)).await;
        assert!(cache.get("k").await.is_none());
    }
}
