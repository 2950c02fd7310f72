//! Prompt normalization and cache keys
//!
//! A cache key is the SHA-256 of the normalized description prefixed with a
//! format version tag. There is no salt: keys are stable across restarts and
//! across processes sharing the same stores.

use crate::error::{Result, SurveyError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Cache format version, bumped whenever the payload layout changes
pub const CACHE_FORMAT_VERSION: &str = "v1";

/// Namespace for keys in the fast cache
pub const FAST_CACHE_NAMESPACE: &str = "survey";

/// Minimum accepted description length, in characters
pub const MIN_DESCRIPTION_CHARS: usize = 5;

/// Maximum accepted description length, in characters
pub const MAX_DESCRIPTION_CHARS: usize = 2000;

/// Fixed-length hex digest identifying one normalized prompt
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// The hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key under which the survey lives in the fast cache
    pub fn fast_cache_key(&self) -> String {
        format!("{}:{}", FAST_CACHE_NAMESPACE, self.0)
    }

    /// Rebuild a key read back from storage
    pub fn from_stored(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Canonical text form of a description: trimmed, whitespace runs collapsed, lowercased
pub fn canonicalize(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Map a raw description to its cache key
///
/// Fails with `InvalidInput` only for empty or whitespace-only input.
pub fn normalize(raw: &str) -> Result<CacheKey> {
    let canonical = canonicalize(raw);
    if canonical.is_empty() {
        return Err(SurveyError::InvalidInput(
            "description must not be empty".to_string(),
        ));
    }

    let mut hasher = Sha256::new();
    hasher.update(CACHE_FORMAT_VERSION.as_bytes());
    hasher.update(b"|");
    hasher.update(canonical.as_bytes());
    Ok(CacheKey(format!("{:x}", hasher.finalize())))
}

/// Check the description length bounds
pub fn validate_description(raw: &str) -> Result<()> {
    let len = raw.chars().count();
    if !(MIN_DESCRIPTION_CHARS..=MAX_DESCRIPTION_CHARS).contains(&len) {
        return Err(SurveyError::InvalidInput(format!(
            "description must be {}-{} characters, got {}",
            MIN_DESCRIPTION_CHARS, MAX_DESCRIPTION_CHARS, len
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize() {
        assert_eq!(canonicalize("  Hello\t\tWORLD \n again "), "hello world again");
        assert_eq!(canonicalize("   "), "");
    }

    #[test]
    fn test_whitespace_and_case_variants_share_a_key() {
        let a = normalize("Customer satisfaction for an online store").unwrap();
        let b = normalize("  customer   SATISFACTION\nfor an\tonline store  ").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_prompts_differ() {
        let a = normalize("employee engagement").unwrap();
        let b = normalize("employee engagement survey").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_is_fixed_length_hex() {
        let key = normalize("event feedback").unwrap();
        assert_eq!(key.as_str().len(), 64);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_key_is_versioned_and_stable() {
        // sha256("v1|abc")
        let key = normalize("ABC").unwrap();
        let mut hasher = Sha256::new();
        hasher.update(b"v1|abc");
        assert_eq!(key.as_str(), format!("{:x}", hasher.finalize()));
    }

    #[test]
    fn test_fast_cache_key_namespace() {
        let key = normalize("event feedback").unwrap();
        assert_eq!(key.fast_cache_key(), format!("survey:{}", key));
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(matches!(normalize(""), Err(SurveyError::InvalidInput(_))));
        assert!(matches!(normalize(" \t\n"), Err(SurveyError::InvalidInput(_))));
    }

    #[test]
    fn test_description_bounds() {
        assert!(validate_description(&"a".repeat(4)).is_err());
        assert!(validate_description(&"a".repeat(5)).is_ok());
        assert!(validate_description(&"a".repeat(2000)).is_ok());
        assert!(validate_description(&"a".repeat(2001)).is_err());
    }

    #[test]
    fn test_description_bounds_count_characters() {
        // five multi-byte characters
        assert!(validate_description("ééééé").is_ok());
    }
}
