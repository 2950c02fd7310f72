//! Configuration for the in-process fast cache

use crate::error::{Result, SurveyError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for `MemoryFastCache`
///
/// The TTL itself comes from the caller on every write; this config bounds
/// memory and decides how much jitter spreads out expiry times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryCacheConfig {
    /// Maximum number of entries in the cache
    pub max_entries: usize,

    /// Maximum total size of cached data in bytes
    pub max_size_bytes: usize,

    /// TTL jitter factor (0.0 - 1.0)
    /// Adds random variation so a burst of writes does not expire at once
    pub ttl_jitter: f64,

    /// Enable LRU eviction policy
    /// When false, reads do not refresh an entry's position
    pub enable_lru_eviction: bool,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            // 100 MB default
            max_size_bytes: 100 * 1024 * 1024,
            ttl_jitter: 0.1,
            enable_lru_eviction: true,
        }
    }
}

impl MemoryCacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> MemoryCacheConfigBuilder {
        MemoryCacheConfigBuilder::default()
    }

    /// Configuration for memory-constrained environments and tests
    pub fn small() -> Self {
        Self {
            max_entries: 1_000,
            max_size_bytes: 10 * 1024 * 1024,
            ..Default::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(SurveyError::Config("max_entries must be greater than 0".to_string()));
        }

        if self.max_size_bytes == 0 {
            return Err(SurveyError::Config("max_size_bytes must be greater than 0".to_string()));
        }

        if !(0.0..=1.0).contains(&self.ttl_jitter) {
            return Err(SurveyError::Config("ttl_jitter must be between 0.0 and 1.0".to_string()));
        }

        Ok(())
    }

    /// Apply jitter to a caller-supplied TTL
    pub fn ttl_with_jitter(&self, ttl: Duration) -> Duration {
        if self.ttl_jitter == 0.0 {
            return ttl;
        }

        let base_secs = ttl.as_secs_f64();
        let jitter_range = base_secs * self.ttl_jitter;
        let jitter = (rand::random::<f64>() * 2.0 - 1.0) * jitter_range;
        let final_secs = (base_secs + jitter).max(0.001);

        Duration::from_secs_f64(final_secs)
    }
}

/// Builder for `MemoryCacheConfig`
#[derive(Debug, Default)]
pub struct MemoryCacheConfigBuilder {
    max_entries: Option<usize>,
    max_size_bytes: Option<usize>,
    ttl_jitter: Option<f64>,
    enable_lru_eviction: Option<bool>,
}

impl MemoryCacheConfigBuilder {
    /// Set maximum number of cache entries
    pub fn max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max);
        self
    }

    /// Set maximum cache size in bytes
    pub fn max_size_bytes(mut self, size: usize) -> Self {
        self.max_size_bytes = Some(size);
        self
    }

    /// Set TTL jitter factor (0.0 - 1.0)
    pub fn ttl_jitter(mut self, jitter: f64) -> Self {
        self.ttl_jitter = Some(jitter);
        self
    }

    /// Enable or disable LRU eviction
    pub fn enable_lru_eviction(mut self, enable: bool) -> Self {
        self.enable_lru_eviction = Some(enable);
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> MemoryCacheConfig {
        let defaults = MemoryCacheConfig::default();

        MemoryCacheConfig {
            max_entries: self.max_entries.unwrap_or(defaults.max_entries),
            max_size_bytes: self.max_size_bytes.unwrap_or(defaults.max_size_bytes),
            ttl_jitter: self.ttl_jitter.unwrap_or(defaults.ttl_jitter),
            enable_lru_eviction: self
                .enable_lru_eviction
                .unwrap_or(defaults.enable_lru_eviction),
        }
    }
}
