//! Fast cache entry with TTL

use chrono::{DateTime, Utc};
use std::time::Duration;

/// A cached payload with its expiry metadata
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The fast cache key
    pub key: String,

    /// The cached payload
    pub value: Vec<u8>,

    /// Entry metadata
    pub metadata: CacheMetadata,
}

/// Metadata associated with a cache entry
#[derive(Debug, Clone)]
pub struct CacheMetadata {
    /// When the entry was written
    pub created_at: DateTime<Utc>,

    /// Last access time (for LRU tracking)
    pub accessed_at: DateTime<Utc>,

    /// When the entry expires
    pub expires_at: DateTime<Utc>,

    /// Number of times this entry has been read
    pub access_count: u64,

    /// Approximate size of the entry in bytes
    pub size_bytes: usize,
}

impl CacheEntry {
    /// Create a new entry expiring after `ttl`
    pub fn new(key: String, value: Vec<u8>, ttl: Duration) -> Self {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::seconds(3600));
        let size_bytes = key.len() + value.len() + std::mem::size_of::<CacheMetadata>();

        Self {
            key,
            value,
            metadata: CacheMetadata {
                created_at: now,
                accessed_at: now,
                expires_at,
                access_count: 0,
                size_bytes,
            },
        }
    }

    /// Check if the entry has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.metadata.expires_at
    }

    /// Get time until expiration
    pub fn time_until_expiration(&self) -> Option<Duration> {
        (self.metadata.expires_at - Utc::now()).to_std().ok()
    }

    /// Mark the entry as accessed (updates access time and count)
    pub fn mark_accessed(&mut self) {
        self.metadata.accessed_at = Utc::now();
        self.metadata.access_count += 1;
    }
}
