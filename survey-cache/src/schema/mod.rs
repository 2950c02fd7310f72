//! Survey schema module
//!
//! Defines the survey document produced by the generator and cached by both
//! tiers, plus the durable record that wraps it.

pub mod record;
pub mod survey;

pub use record::{CacheRecord, InsertOutcome};
pub use survey::{
    Question, QuestionType, SchemaViolation, SurveyDocument, MAX_QUESTION_TITLE_CHARS,
};
