//! In-process durable store

use crate::error::Result;
use crate::key::CacheKey;
use crate::schema::{CacheRecord, InsertOutcome};
use crate::store::{DurableStore, HealthCheckResult};
use async_trait::async_trait;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Durable store kept in process memory
///
/// Records live as long as the process. Clones share the same map.
#[derive(Clone, Default)]
pub struct MemorySurveyStore {
    records: Arc<RwLock<HashMap<CacheKey, CacheRecord>>>,
}

impl MemorySurveyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl DurableStore for MemorySurveyStore {
    async fn find_by_key(&self, key: &CacheKey) -> Result<Option<CacheRecord>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn insert_if_absent(&self, record: &CacheRecord) -> Result<InsertOutcome> {
        let mut records = self.records.write().await;
        match records.entry(record.key.clone()) {
            Entry::Occupied(_) => {
                debug!("Record already exists: {}", record.key);
                Ok(InsertOutcome::AlreadyExists)
            }
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                debug!("Record inserted: {}", record.key);
                Ok(InsertOutcome::Inserted)
            }
        }
    }

    async fn health(&self) -> HealthCheckResult {
        HealthCheckResult::healthy("memory", Duration::ZERO, None, u64::MAX)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
