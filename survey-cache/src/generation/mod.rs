//! # Generation tier
//!
//! The expensive, unreliable last resort. A generator either returns a
//! document that already passed schema validation or fails with
//! `GenerationUnavailable` once its own retries are spent. It never returns
//! a placeholder.

pub mod llm;

pub use llm::{GenerationFailure, GeneratorConfig, LlmSurveyGenerator, SYSTEM_PROMPT};

use crate::error::Result;
use crate::schema::SurveyDocument;
use async_trait::async_trait;

/// Produces a survey document from a free-text description
#[async_trait]
pub trait SurveyGenerator: Send + Sync {
    /// Generate a validated document for `description`
    async fn generate(&self, description: &str) -> Result<SurveyDocument>;

    /// Model or backend identifier for logs
    fn model(&self) -> &str;
}
