//! # Survey Cache (survey-cache)
//!
//! Turns a free-text description into a structured survey document, with a
//! two-tier cache in front of an external generative model.
//!
//! ## Features
//!
//! - Deterministic prompt normalization into versioned SHA-256 cache keys
//! - Fast cache tier with TTL (Redis, in-memory or disabled)
//! - Durable store tier with insert-if-absent semantics (Neo4j or in-memory)
//! - Chat-completions generator with schema validation and classified retries
//! - Single-pass orchestrator with a request deadline and detached write-back
//!
//! ## Resolution order
//!
//! 1. Fast cache hit: returned immediately
//! 2. Durable store hit: returned, fast cache refilled in the background
//! 3. Generation: returned, both tiers filled in the background
//!
//! An unavailable or corrupt tier is skipped. Only invalid input, a failed
//! generation or the deadline reach the caller.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use survey_cache::{
//!     GeneratorConfig, LlmSurveyGenerator, MemoryCacheConfig, MemoryFastCache,
//!     MemorySurveyStore, OrchestratorConfig, SurveyCacheOrchestrator,
//! };
//!
//! #[tokio::main]
//! async fn main() -> survey_cache::Result<()> {
//!     let generator = LlmSurveyGenerator::new(GeneratorConfig::new("gsk_..."))?;
//!     let orchestrator = SurveyCacheOrchestrator::new(
//!         Arc::new(MemoryFastCache::new(MemoryCacheConfig::default())),
//!         Arc::new(MemorySurveyStore::new()),
//!         Arc::new(generator),
//!         OrchestratorConfig::default(),
//!     );
//!
//!     let outcome = orchestrator
//!         .get_or_create_survey("Customer satisfaction for an online store")
//!         .await?;
//!     println!("{} ({})", outcome.document.title, outcome.source);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod error;
pub mod generation;
pub mod key;
pub mod orchestrator;
pub mod retry;
pub mod schema;
pub mod store;

// Re-export main types for convenience
pub use cache::{
    CacheStats, DisabledFastCache, FastCache, MemoryCacheConfig, MemoryCacheConfigBuilder,
    MemoryFastCache, RedisFastCache,
};
pub use error::{Result, SurveyError};
pub use generation::{GenerationFailure, GeneratorConfig, LlmSurveyGenerator, SurveyGenerator};
pub use key::{canonicalize, normalize, validate_description, CacheKey};
pub use orchestrator::{
    OrchestratorConfig, SurveyCacheOrchestrator, SurveyOutcome, SurveySource, WriteBack,
    WriteBackReport, WriteResult,
};
pub use retry::RetryPolicy;
pub use schema::{
    CacheRecord, InsertOutcome, Question, QuestionType, SchemaViolation, SurveyDocument,
};
pub use store::{
    DurableStore, HealthCheckResult, HealthStatus, MemorySurveyStore, Neo4jStoreConfig,
    Neo4jSurveyStore,
};
