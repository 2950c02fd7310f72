//! # Durable store tier
//!
//! The source of truth: one record per normalized prompt, written once on the
//! first successful generation and never updated. `insert_if_absent` is the
//! only mutual exclusion the pipeline has; concurrent writers for the same key
//! see exactly one `Inserted` and the rest `AlreadyExists`.
//!
//! ## Backends
//!
//! - [`Neo4jSurveyStore`]: `(:CachedSurvey {key})` nodes with a uniqueness constraint
//! - [`MemorySurveyStore`]: process-local map, for development and tests

pub mod health;
pub mod memory;
pub mod neo4j;

pub use health::{HealthCheckResult, HealthStatus};
pub use memory::MemorySurveyStore;
pub use neo4j::{Neo4jStoreConfig, Neo4jSurveyStore};

use crate::error::Result;
use crate::key::CacheKey;
use crate::schema::{CacheRecord, InsertOutcome};
use async_trait::async_trait;

/// Persistent key/value store holding one record per prompt
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Look up the record for `key`. `Ok(None)` means no record exists.
    async fn find_by_key(&self, key: &CacheKey) -> Result<Option<CacheRecord>>;

    /// Write `record` unless a record for its key already exists
    async fn insert_if_absent(&self, record: &CacheRecord) -> Result<InsertOutcome>;

    /// Check the backend
    async fn health(&self) -> HealthCheckResult;

    /// Short backend name for logs and health output
    fn backend_name(&self) -> &'static str;
}
