//! In-process fast cache with TTL expiry and LRU eviction

use crate::cache::{
    config::MemoryCacheConfig,
    entry::CacheEntry,
    types::CacheStats,
    FastCache,
};
use crate::error::Result;
use crate::key::CacheKey;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Fast cache kept in process memory
///
/// Used when no Redis is configured. Entries expire on read once past their
/// TTL, and the least recently used entries are evicted when the entry or
/// byte budget is exceeded. Clones share the same storage.
#[derive(Clone)]
pub struct MemoryFastCache {
    config: MemoryCacheConfig,
    store: Arc<RwLock<CacheStore>>,
}

struct CacheStore {
    entries: HashMap<String, CacheEntry>,
    lru_queue: VecDeque<String>,
    stats: CacheStats,
    current_size_bytes: usize,
}

impl MemoryFastCache {
    /// Create a new cache with the given configuration
    pub fn new(config: MemoryCacheConfig) -> Self {
        info!("Initializing in-memory fast cache with config: {:?}", config);

        let store = CacheStore {
            entries: HashMap::new(),
            lru_queue: VecDeque::new(),
            stats: CacheStats::default(),
            current_size_bytes: 0,
        };

        Self {
            config,
            store: Arc::new(RwLock::new(store)),
        }
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        let store = self.store.read().await;
        let mut stats = store.stats.clone();
        stats.entries = store.entries.len();
        stats.size_bytes = store.current_size_bytes;
        stats
    }

    /// Get number of entries in cache (expired entries included until read)
    pub async fn len(&self) -> usize {
        self.store.read().await.entries.len()
    }

    /// Check if cache is empty
    pub async fn is_empty(&self) -> bool {
        self.store.read().await.entries.is_empty()
    }

    /// Remove all expired entries, returning how many were dropped
    pub async fn cleanup_expired(&self) -> usize {
        let mut store = self.store.write().await;
        let expired: Vec<String> = store
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            remove_entry(&mut store, key);
        }
        store.stats.evictions_ttl += expired.len() as u64;

        if !expired.is_empty() {
            debug!("Cleaned up {} expired entries", expired.len());
        }
        expired.len()
    }

    fn evict_if_needed(&self, store: &mut CacheStore, needed_size: usize) {
        while store.entries.len() >= self.config.max_entries {
            match store.lru_queue.pop_front() {
                Some(key) => {
                    debug!("Evicting entry due to max_entries limit: {}", key);
                    remove_entry(store, &key);
                    store.stats.evictions_size += 1;
                }
                None => break,
            }
        }

        while store.current_size_bytes + needed_size > self.config.max_size_bytes {
            match store.lru_queue.pop_front() {
                Some(key) => {
                    debug!("Evicting entry due to size limit: {}", key);
                    remove_entry(store, &key);
                    store.stats.evictions_size += 1;
                }
                None => {
                    warn!("Cannot evict more entries, entry larger than cache size limit");
                    break;
                }
            }
        }
    }
}

fn remove_entry(store: &mut CacheStore, key: &str) {
    if let Some(entry) = store.entries.remove(key) {
        store.lru_queue.retain(|k| k != key);
        store.current_size_bytes = store
            .current_size_bytes
            .saturating_sub(entry.metadata.size_bytes);
    }
}

#[async_trait]
impl FastCache for MemoryFastCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let cache_key = key.fast_cache_key();
        let mut guard = self.store.write().await;
        let store = &mut *guard;

        let expired = match store.entries.get_mut(&cache_key) {
            None => {
                debug!("Cache miss: {}", cache_key);
                store.stats.misses += 1;
                return Ok(None);
            }
            Some(entry) if entry.is_expired() => true,
            Some(entry) => {
                entry.mark_accessed();
                false
            }
        };

        if expired {
            debug!("Cache entry expired: {}", cache_key);
            remove_entry(store, &cache_key);
            store.stats.misses += 1;
            store.stats.evictions_ttl += 1;
            return Ok(None);
        }

        let value = store.entries.get(&cache_key).map(|e| e.value.clone());
        store.stats.hits += 1;

        if self.config.enable_lru_eviction {
            store.lru_queue.retain(|k| k != &cache_key);
            store.lru_queue.push_back(cache_key.clone());
        }

        debug!("Cache hit: {}", cache_key);
        Ok(value)
    }

    async fn set_with_ttl(&self, key: &CacheKey, ttl: Duration, value: Vec<u8>) -> Result<()> {
        let cache_key = key.fast_cache_key();
        let entry = CacheEntry::new(cache_key.clone(), value, self.config.ttl_with_jitter(ttl));
        let size = entry.metadata.size_bytes;

        let mut store = self.store.write().await;
        remove_entry(&mut store, &cache_key);
        self.evict_if_needed(&mut store, size);

        store.entries.insert(cache_key.clone(), entry);
        store.lru_queue.push_back(cache_key.clone());
        store.current_size_bytes += size;
        store.stats.writes += 1;

        debug!("Cache set: {} (ttl {:?})", cache_key, ttl);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Background task that periodically drops expired entries
pub async fn start_auto_cleanup(cache: MemoryFastCache, interval: Duration) {
    info!("Starting fast cache cleanup task (interval: {:?})", interval);

    loop {
        tokio::time::sleep(interval).await;
        cache.cleanup_expired().await;
    }
}
