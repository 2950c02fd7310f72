//! # Fast cache tier
//!
//! The first-read, last-write layer in front of the durable store. Entries are
//! disposable and expire by TTL; nothing here is ever the only copy of a survey.
//!
//! Every backend reports "could not ask" as `SurveyError::CacheUnavailable` and
//! "not found" as `Ok(None)`, so the orchestrator can tell the two apart.
//!
//! ## Backends
//!
//! - [`RedisFastCache`]: shared Redis, lazily connected once and reused
//! - [`MemoryFastCache`]: in-process TTL cache with LRU eviction
//! - [`DisabledFastCache`]: always unavailable; runs the pipeline on the durable tier only
//!
//! ## Example
//!
//! ```rust
//! use survey_cache::cache::{FastCache, MemoryCacheConfig, MemoryFastCache};
//! use survey_cache::key::normalize;
//! use std::time::Duration;
//!
//! # async fn example() -> survey_cache::Result<()> {
//! let cache = MemoryFastCache::new(MemoryCacheConfig::default());
//! let key = normalize("Customer satisfaction for an online store")?;
//!
//! cache.set_with_ttl(&key, Duration::from_secs(3600), b"{}".to_vec()).await?;
//! assert!(cache.get(&key).await?.is_some());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod entry;
pub mod memory;
pub mod redis;
pub mod types;

pub use config::{MemoryCacheConfig, MemoryCacheConfigBuilder};
pub use entry::{CacheEntry, CacheMetadata};
pub use memory::{start_auto_cleanup, MemoryFastCache};
pub use self::redis::RedisFastCache;
pub use types::CacheStats;

use crate::error::{Result, SurveyError};
use crate::key::CacheKey;
use async_trait::async_trait;
use std::time::Duration;

/// Key/value store with TTL used as the fast path
#[async_trait]
pub trait FastCache: Send + Sync {
    /// Read a payload. `Ok(None)` means the key is not cached.
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>>;

    /// Write a payload that expires after `ttl`
    async fn set_with_ttl(&self, key: &CacheKey, ttl: Duration, value: Vec<u8>) -> Result<()>;

    /// Short backend name for logs and health output
    fn backend_name(&self) -> &'static str;
}

/// Fast cache that is never available
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledFastCache;

#[async_trait]
impl FastCache for DisabledFastCache {
    async fn get(&self, _key: &CacheKey) -> Result<Option<Vec<u8>>> {
        Err(SurveyError::CacheUnavailable("fast cache disabled".to_string()))
    }

    async fn set_with_ttl(&self, _key: &CacheKey, _ttl: Duration, _value: Vec<u8>) -> Result<()> {
        Err(SurveyError::CacheUnavailable("fast cache disabled".to_string()))
    }

    fn backend_name(&self) -> &'static str {
        "disabled"
    }
}
