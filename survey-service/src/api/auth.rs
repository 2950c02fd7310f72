//! JWT token generation and validation

use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Role given to tokens minted by the dev login
pub const DEVELOPER_ROLE: &str = "developer";

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// Subject (user identifier)
    pub sub: String,
    /// Issued at (timestamp)
    pub iat: i64,
    /// Expiration time (timestamp)
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// HS256 token issuer and verifier
pub struct JwtAuth {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_seconds: i64,
}

impl JwtAuth {
    /// Create a handler whose tokens live for `ttl_seconds`
    pub fn new(secret: &str, ttl_seconds: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_seconds,
        }
    }

    /// Token lifetime in seconds
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Mint a token for `subject`
    pub fn generate_token(&self, subject: &str, role: Option<&str>) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.ttl_seconds);

        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            role: role.map(str::to_string),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| anyhow!("Failed to generate token: {}", e))
    }

    /// Validate a token and extract its claims
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| anyhow!("Invalid token: {}", e))?;

        Ok(token_data.claims)
    }

    /// Extract the token from an `Authorization: Bearer <token>` header
    pub fn extract_bearer_token(auth_header: &str) -> Result<&str> {
        let (scheme, token) = auth_header
            .split_once(' ')
            .ok_or_else(|| anyhow!("Invalid authorization header format"))?;

        if !scheme.eq_ignore_ascii_case("bearer") {
            return Err(anyhow!("Invalid authorization header format"));
        }

        let token = token.trim();
        if token.is_empty() {
            return Err(anyhow!("Empty token"));
        }

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_and_validate_token() {
        let auth = JwtAuth::new("test_secret_key_12345", 3600);

        let token = auth.generate_token("dev@example.com", Some(DEVELOPER_ROLE)).unwrap();
        let claims = auth.validate_token(&token).unwrap();

        assert_eq!(claims.sub, "dev@example.com");
        assert_eq!(claims.role.as_deref(), Some(DEVELOPER_ROLE));
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = JwtAuth::new("secret-one", 3600)
            .generate_token("user", None)
            .unwrap();
        assert!(JwtAuth::new("secret-two", 3600).validate_token(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        // Well past the default 60s leeway
        let auth = JwtAuth::new("test_secret_key_12345", -600);
        let token = auth.generate_token("user", None).unwrap();
        assert!(auth.validate_token(&token).is_err());
    }

    #[test]
    fn test_invalid_token() {
        let auth = JwtAuth::new("test_secret_key_12345", 3600);
        assert!(auth.validate_token("invalid.token.here").is_err());
    }

    #[test]
    fn test_extract_bearer_token() {
        let token = JwtAuth::extract_bearer_token("Bearer abc.def.ghi").unwrap();
        assert_eq!(token, "abc.def.ghi");

        let token = JwtAuth::extract_bearer_token("bearer abc.def.ghi").unwrap();
        assert_eq!(token, "abc.def.ghi");
    }

    #[test]
    fn test_extract_bearer_token_invalid() {
        assert!(JwtAuth::extract_bearer_token("Basic dXNlcjpwYXNz").is_err());
        assert!(JwtAuth::extract_bearer_token("Bearer ").is_err());
        assert!(JwtAuth::extract_bearer_token("token-without-scheme").is_err());
    }
}
