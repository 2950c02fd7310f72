//! Durable cache record

use crate::key::CacheKey;
use crate::schema::survey::SurveyDocument;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the durable store: the first successful generation for a key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Normalized prompt hash (unique)
    pub key: CacheKey,
    /// Original description, kept for audit
    pub raw_prompt: String,
    /// Serialized `SurveyDocument`
    pub payload: Vec<u8>,
    /// When the record was first written
    pub created_at: DateTime<Utc>,
}

impl CacheRecord {
    /// Create a new record stamped with the current time
    pub fn new(key: CacheKey, raw_prompt: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            key,
            raw_prompt: raw_prompt.into(),
            payload,
            created_at: Utc::now(),
        }
    }

    /// Create a record from a document, serializing its payload
    pub fn from_document(
        key: CacheKey,
        raw_prompt: impl Into<String>,
        document: &SurveyDocument,
    ) -> serde_json::Result<Self> {
        Ok(Self::new(key, raw_prompt, document.to_payload()?))
    }

    /// Decode the stored payload
    pub fn document(&self) -> Result<SurveyDocument, String> {
        SurveyDocument::from_payload(&self.payload)
    }
}

/// Outcome of `insert_if_absent`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// This call wrote the row
    Inserted,
    /// A row for the key already existed; nothing was written
    AlreadyExists,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::normalize;
    use crate::schema::survey::{Question, QuestionType};

    #[test]
    fn test_record_round_trip() {
        let key = normalize("Customer satisfaction for an online store").unwrap();
        let doc = SurveyDocument::new(
            "Store",
            "",
            vec![Question::new(QuestionType::OpenQuestion, "Anything else?")],
        );

        let record = CacheRecord::from_document(key.clone(), "raw", &doc).unwrap();
        assert_eq!(record.key, key);
        assert_eq!(record.raw_prompt, "raw");
        assert_eq!(record.document().unwrap(), doc);
    }

    #[test]
    fn test_corrupt_payload_is_reported() {
        let key = normalize("hello world").unwrap();
        let record = CacheRecord::new(key, "hello world", b"{\"title\":".to_vec());
        assert!(record.document().is_err());
    }
}
