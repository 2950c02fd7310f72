//! Survey cache orchestrator
//!
//! Resolves a description to a survey document by walking the tiers in order:
//! fast cache, durable store, generator. Unavailable or corrupt tiers are
//! skipped, never surfaced. After a durable hit or a fresh generation the
//! missing tiers are filled by a detached task, so persistence never delays
//! or fails the response.

use crate::cache::FastCache;
use crate::error::{Result, SurveyError};
use crate::generation::SurveyGenerator;
use crate::key::{normalize, validate_description, CacheKey};
use crate::schema::{CacheRecord, InsertOutcome, SurveyDocument};
use crate::store::{DurableStore, HealthCheckResult};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument, Span};

/// Orchestrator settings
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// TTL for fast-cache entries
    pub fast_ttl: Duration,
    /// Deadline for the lookup and generation pipeline
    pub request_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            fast_ttl: Duration::from_secs(3600),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_fast_ttl(mut self, ttl: Duration) -> Self {
        self.fast_ttl = ttl;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Tier that produced the returned document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SurveySource {
    FastCache,
    DurableStore,
    Generated,
}

impl SurveySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurveySource::FastCache => "fast_cache",
            SurveySource::DurableStore => "durable_store",
            SurveySource::Generated => "generated",
        }
    }

    /// Whether the document was served from a cache tier
    pub fn is_cached(&self) -> bool {
        !matches!(self, SurveySource::Generated)
    }
}

impl fmt::Display for SurveySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one best-effort write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    Written,
    /// Durable store only: another writer got there first
    AlreadyExists,
    Failed(String),
    /// Not attempted for this path
    Skipped,
}

/// What the background persistence task managed to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteBackReport {
    pub durable: WriteResult,
    pub fast_cache: WriteResult,
}

/// Handle to a detached persistence task
///
/// Dropping it does not cancel the task.
#[derive(Debug)]
pub struct WriteBack {
    handle: JoinHandle<WriteBackReport>,
}

impl WriteBack {
    /// Wait for the task. `None` if it panicked.
    pub async fn wait(self) -> Option<WriteBackReport> {
        self.handle.await.ok()
    }
}

/// Document plus how it was obtained
#[derive(Debug)]
pub struct SurveyOutcome {
    pub document: SurveyDocument,
    pub key: CacheKey,
    pub source: SurveySource,
    pub write_back: Option<WriteBack>,
}

/// Two-tier cache in front of the generator
///
/// Cheap to clone; clones share the same client handles.
#[derive(Clone)]
pub struct SurveyCacheOrchestrator {
    fast_cache: Arc<dyn FastCache>,
    store: Arc<dyn DurableStore>,
    generator: Arc<dyn SurveyGenerator>,
    config: OrchestratorConfig,
}

impl SurveyCacheOrchestrator {
    pub fn new(
        fast_cache: Arc<dyn FastCache>,
        store: Arc<dyn DurableStore>,
        generator: Arc<dyn SurveyGenerator>,
        config: OrchestratorConfig,
    ) -> Self {
        info!(
            "Survey orchestrator: fast cache {}, durable store {}, model {}",
            fast_cache.backend_name(),
            store.backend_name(),
            generator.model()
        );

        Self {
            fast_cache,
            store,
            generator,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn fast_cache_backend(&self) -> &'static str {
        self.fast_cache.backend_name()
    }

    /// Health of the durable store
    pub async fn store_health(&self) -> HealthCheckResult {
        self.store.health().await
    }

    /// Return the survey for `raw_description`, generating it on a full miss
    ///
    /// Errors are limited to `InvalidInput`, `GenerationUnavailable` and
    /// `Timeout`; cache and store trouble only changes which tier answers.
    #[instrument(skip(self, raw_description), fields(key = tracing::field::Empty))]
    pub async fn get_or_create_survey(&self, raw_description: &str) -> Result<SurveyOutcome> {
        validate_description(raw_description)?;
        let key = normalize(raw_description)?;
        Span::current().record("key", key.as_str());

        let deadline = self.config.request_timeout;
        match tokio::time::timeout(deadline, self.resolve(key, raw_description)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Survey request exceeded {:?}", deadline);
                Err(SurveyError::Timeout {
                    timeout_ms: deadline.as_millis() as u64,
                    context: "get_or_create_survey".to_string(),
                })
            }
        }
    }

    async fn resolve(&self, key: CacheKey, raw_description: &str) -> Result<SurveyOutcome> {
        if let Some(document) = self.check_fast_cache(&key).await {
            return Ok(SurveyOutcome {
                document,
                key,
                source: SurveySource::FastCache,
                write_back: None,
            });
        }

        if let Some(document) = self.check_durable_store(&key).await {
            let write_back = self.spawn_fast_cache_refill(&key, &document);
            return Ok(SurveyOutcome {
                document,
                key,
                source: SurveySource::DurableStore,
                write_back,
            });
        }

        info!("Cache miss on both tiers, generating survey");
        let mut document = self.generator.generate(raw_description).await.map_err(|e| {
            error!("Survey generation failed: {}", e);
            e
        })?;
        document.strip_non_choice_options();

        if let Err(violation) = document.validate() {
            error!("Generator returned an invalid survey: {}", violation);
            return Err(SurveyError::GenerationUnavailable(format!(
                "generated survey failed validation: {}",
                violation
            )));
        }

        let write_back = self.spawn_persist(&key, raw_description, &document);
        Ok(SurveyOutcome {
            document,
            key,
            source: SurveySource::Generated,
            write_back,
        })
    }

    async fn check_fast_cache(&self, key: &CacheKey) -> Option<SurveyDocument> {
        match self.fast_cache.get(key).await {
            Ok(Some(payload)) => match SurveyDocument::from_payload(&payload) {
                Ok(document) => {
                    debug!("Fast cache hit");
                    Some(document)
                }
                Err(reason) => {
                    let err = SurveyError::MalformedCacheEntry {
                        key: key.fast_cache_key(),
                        reason,
                    };
                    warn!("{}, treating as miss", err);
                    None
                }
            },
            Ok(None) => {
                debug!("Fast cache miss");
                None
            }
            Err(e) => {
                warn!("{}, falling through to durable store", e);
                None
            }
        }
    }

    async fn check_durable_store(&self, key: &CacheKey) -> Option<SurveyDocument> {
        match self.store.find_by_key(key).await {
            Ok(Some(record)) => match record.document() {
                Ok(document) => {
                    debug!("Durable store hit");
                    Some(document)
                }
                Err(reason) => {
                    let err = SurveyError::MalformedCacheEntry {
                        key: key.to_string(),
                        reason,
                    };
                    warn!("{}, regenerating", err);
                    None
                }
            },
            Ok(None) => {
                debug!("Durable store miss");
                None
            }
            Err(e) => {
                warn!("{}, falling through to generation", e);
                None
            }
        }
    }

    fn encode(document: &SurveyDocument) -> Option<Vec<u8>> {
        match document.to_payload() {
            Ok(payload) => Some(payload),
            Err(e) => {
                error!("Could not encode survey for caching: {}", e);
                None
            }
        }
    }

    fn spawn_fast_cache_refill(&self, key: &CacheKey, document: &SurveyDocument) -> Option<WriteBack> {
        let payload = Self::encode(document)?;
        let fast_cache = Arc::clone(&self.fast_cache);
        let key = key.clone();
        let ttl = self.config.fast_ttl;

        let task = async move {
            WriteBackReport {
                durable: WriteResult::Skipped,
                fast_cache: write_fast_cache(fast_cache.as_ref(), &key, ttl, payload).await,
            }
        };

        Some(WriteBack {
            handle: tokio::spawn(task.instrument(info_span!("fast_cache_refill"))),
        })
    }

    fn spawn_persist(
        &self,
        key: &CacheKey,
        raw_description: &str,
        document: &SurveyDocument,
    ) -> Option<WriteBack> {
        let payload = Self::encode(document)?;
        let fast_cache = Arc::clone(&self.fast_cache);
        let store = Arc::clone(&self.store);
        let record = CacheRecord::new(key.clone(), raw_description, payload.clone());
        let ttl = self.config.fast_ttl;

        let task = async move {
            let (durable, fast_cache) = match store.insert_if_absent(&record).await {
                Ok(InsertOutcome::Inserted) => {
                    info!("Survey persisted to durable store");
                    let refill = write_fast_cache(fast_cache.as_ref(), &record.key, ttl, payload).await;
                    (WriteResult::Written, refill)
                }
                Ok(InsertOutcome::AlreadyExists) => {
                    // Another writer won; the fast cache must mirror its record, not ours
                    debug!("Durable record already present, refilling fast cache from it");
                    let refill = refill_from_winner(store.as_ref(), fast_cache.as_ref(), &record.key, ttl).await;
                    (WriteResult::AlreadyExists, refill)
                }
                Err(e) => {
                    warn!("Durable write-back failed: {}", e);
                    let refill = write_fast_cache(fast_cache.as_ref(), &record.key, ttl, payload).await;
                    (WriteResult::Failed(e.to_string()), refill)
                }
            };

            WriteBackReport {
                durable,
                fast_cache,
            }
        };

        Some(WriteBack {
            handle: tokio::spawn(task.instrument(info_span!("persist_survey"))),
        })
    }
}

/// Copy the durable record for `key` into the fast cache
///
/// Skipped when the record cannot be read back or does not decode.
async fn refill_from_winner(
    store: &dyn DurableStore,
    fast_cache: &dyn FastCache,
    key: &CacheKey,
    ttl: Duration,
) -> WriteResult {
    match store.find_by_key(key).await {
        Ok(Some(record)) if record.document().is_ok() => {
            write_fast_cache(fast_cache, key, ttl, record.payload).await
        }
        Ok(Some(_)) => {
            warn!("Durable record for {} is malformed, leaving fast cache untouched", key);
            WriteResult::Skipped
        }
        Ok(None) => WriteResult::Skipped,
        Err(e) => {
            warn!("Could not read back durable record: {}", e);
            WriteResult::Skipped
        }
    }
}

async fn write_fast_cache(
    fast_cache: &dyn FastCache,
    key: &CacheKey,
    ttl: Duration,
    payload: Vec<u8>,
) -> WriteResult {
    match fast_cache.set_with_ttl(key, ttl, payload).await {
        Ok(()) => {
            debug!("Fast cache refreshed");
            WriteResult::Written
        }
        Err(e) => {
            warn!("Fast cache write-back failed: {}", e);
            WriteResult::Failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryCacheConfig, MemoryFastCache};
    use crate::schema::{Question, QuestionType};
    use crate::store::MemorySurveyStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingGenerator {
        calls: AtomicU32,
    }

    #[async_trait]
    impl SurveyGenerator for CountingGenerator {
        async fn generate(&self, description: &str) -> Result<SurveyDocument> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SurveyDocument::new(
                format!("Survey: {}", description),
                "",
                vec![Question::new(QuestionType::Scale, "How likely?")],
            ))
        }

        fn model(&self) -> &str {
            "counting"
        }
    }

    fn setup() -> (SurveyCacheOrchestrator, MemorySurveyStore, Arc<CountingGenerator>) {
        let store = MemorySurveyStore::new();
        let generator = Arc::new(CountingGenerator {
            calls: AtomicU32::new(0),
        });
        let orchestrator = SurveyCacheOrchestrator::new(
            Arc::new(MemoryFastCache::new(MemoryCacheConfig::default())),
            Arc::new(store.clone()),
            generator.clone(),
            OrchestratorConfig::default(),
        );
        (orchestrator, store, generator)
    }

    #[tokio::test]
    async fn test_generate_then_serve_from_fast_cache() {
        let (orchestrator, store, generator) = setup();

        let first = orchestrator
            .get_or_create_survey("Team offsite feedback")
            .await
            .unwrap();
        assert_eq!(first.source, SurveySource::Generated);

        let report = first.write_back.unwrap().wait().await.unwrap();
        assert_eq!(report.durable, WriteResult::Written);
        assert_eq!(report.fast_cache, WriteResult::Written);
        assert_eq!(store.len().await, 1);

        let second = orchestrator
            .get_or_create_survey("  team OFFSITE feedback ")
            .await
            .unwrap();
        assert_eq!(second.source, SurveySource::FastCache);
        assert!(second.write_back.is_none());
        assert_eq!(second.document, first.document);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_input_skips_every_tier() {
        let (orchestrator, store, generator) = setup();

        let result = orchestrator.get_or_create_survey("abcd").await;
        assert!(matches!(result, Err(SurveyError::InvalidInput(_))));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
        assert!(store.is_empty().await);
    }

    struct SloppyGenerator;

    #[async_trait]
    impl SurveyGenerator for SloppyGenerator {
        async fn generate(&self, _description: &str) -> Result<SurveyDocument> {
            let mut open = Question::new(QuestionType::OpenQuestion, "Anything else?");
            open.options = Some(vec!["ignored".to_string()]);
            Ok(SurveyDocument::new("Sloppy", "", vec![open]))
        }

        fn model(&self) -> &str {
            "sloppy"
        }
    }

    #[tokio::test]
    async fn test_options_stripped_from_non_choice_questions() {
        let orchestrator = SurveyCacheOrchestrator::new(
            Arc::new(MemoryFastCache::new(MemoryCacheConfig::default())),
            Arc::new(MemorySurveyStore::new()),
            Arc::new(SloppyGenerator),
            OrchestratorConfig::default(),
        );

        let outcome = orchestrator
            .get_or_create_survey("Exit interview questions")
            .await
            .unwrap();
        assert_eq!(outcome.document.questions[0].options, None);
    }

    #[test]
    fn test_source_names() {
        assert_eq!(SurveySource::Generated.to_string(), "generated");
        assert!(SurveySource::DurableStore.is_cached());
        assert!(!SurveySource::Generated.is_cached());
        assert_eq!(
            serde_json::to_value(SurveySource::FastCache).unwrap(),
            serde_json::json!("fast_cache")
        );
    }
}
