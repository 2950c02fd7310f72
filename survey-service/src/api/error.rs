//! HTTP error responses
//!
//! Every error body has the shape `{"error": {"message": ..., "code": ...}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use survey_cache::SurveyError;
use tracing::error;

/// Error returned by handlers and middleware
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_INPUT", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn rate_limited() -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_EXCEEDED", "Rate limit exceeded")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}

impl From<SurveyError> for ApiError {
    fn from(e: SurveyError) -> Self {
        match e {
            SurveyError::InvalidInput(msg) => ApiError::bad_request(msg),
            SurveyError::GenerationUnavailable(_)
            | SurveyError::StoreUnavailable(_)
            | SurveyError::CacheUnavailable(_) => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                "Survey generation service unavailable",
            ),
            SurveyError::Timeout { .. } => {
                ApiError::new(StatusCode::GATEWAY_TIMEOUT, "TIMEOUT_ERROR", "Request timed out")
            }
            other => {
                error!("Unexpected pipeline error: {}", other);
                ApiError::internal("Internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "message": self.message,
                "code": self.code,
            }
        });
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_survey_error_mapping() {
        let cases = [
            (SurveyError::InvalidInput("too short".into()), StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            (
                SurveyError::GenerationUnavailable("503".into()),
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
            ),
            (
                SurveyError::StoreUnavailable("down".into()),
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
            ),
            (
                SurveyError::Timeout {
                    timeout_ms: 30000,
                    context: "test".into(),
                },
                StatusCode::GATEWAY_TIMEOUT,
                "TIMEOUT_ERROR",
            ),
            (
                SurveyError::Serialization("bad".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
        ];

        for (error, status, code) in cases {
            let api_error = ApiError::from(error);
            assert_eq!(api_error.status, status);
            assert_eq!(api_error.code, code);
        }
    }

    #[test]
    fn test_invalid_input_keeps_message() {
        let api_error = ApiError::from(SurveyError::InvalidInput("description too short".into()));
        assert_eq!(api_error.message, "description too short");
    }
}
