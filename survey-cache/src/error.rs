//! Error types for the survey pipeline
//!
//! One error enum covers every tier of the pipeline. Infrastructure variants
//! (`CacheUnavailable`, `StoreUnavailable`, `MalformedCacheEntry`) are absorbed
//! by the orchestrator; only `InvalidInput`, `GenerationUnavailable` and
//! `Timeout` ever reach a caller of `get_or_create_survey`.

use thiserror::Error;

/// Main error type for survey pipeline operations
#[derive(Error, Debug)]
pub enum SurveyError {
    /// Caller error: the description is empty or outside the accepted length
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The fast cache could not be asked (connection refused, timeout, ...)
    #[error("Fast cache unavailable: {0}")]
    CacheUnavailable(String),

    /// The durable store could not be asked or written
    #[error("Durable store unavailable: {0}")]
    StoreUnavailable(String),

    /// The generator failed permanently or exhausted its retries
    #[error("Survey generation unavailable: {0}")]
    GenerationUnavailable(String),

    /// The request deadline expired
    #[error("Operation timed out after {timeout_ms}ms: {context}")]
    Timeout { timeout_ms: u64, context: String },

    /// A stored payload could not be decoded into a valid survey
    #[error("Malformed cache entry for key {key}: {reason}")]
    MalformedCacheEntry { key: String, reason: String },

    /// Serialization error while encoding a survey for storage
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SurveyError {
    /// Whether this error is infrastructure degradation the pipeline can skip past
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            SurveyError::CacheUnavailable(_)
                | SurveyError::StoreUnavailable(_)
                | SurveyError::MalformedCacheEntry { .. }
        )
    }

    /// Stable machine-readable code, used by the transport layer
    pub fn code(&self) -> &'static str {
        match self {
            SurveyError::InvalidInput(_) => "INVALID_INPUT",
            SurveyError::CacheUnavailable(_) => "CACHE_UNAVAILABLE",
            SurveyError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            SurveyError::GenerationUnavailable(_) => "GENERATION_UNAVAILABLE",
            SurveyError::Timeout { .. } => "TIMEOUT_ERROR",
            SurveyError::MalformedCacheEntry { .. } => "MALFORMED_CACHE_ENTRY",
            SurveyError::Serialization(_) => "SERIALIZATION_ERROR",
            SurveyError::Config(_) => "CONFIG_ERROR",
        }
    }
}

/// Result type alias for survey pipeline operations
pub type Result<T> = std::result::Result<T, SurveyError>;

impl From<serde_json::Error> for SurveyError {
    fn from(e: serde_json::Error) -> Self {
        SurveyError::Serialization(e.to_string())
    }
}
