//! Authentication and request-id middleware for Axum

use axum::{
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

use super::auth::{Claims, JwtAuth};
use super::error::ApiError;

/// Header carrying the request id
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Authentication state shared across requests
#[derive(Clone)]
pub struct AuthState {
    pub jwt_auth: Arc<JwtAuth>,
}

impl AuthState {
    pub fn new(secret: &str, ttl_seconds: i64) -> Self {
        Self {
            jwt_auth: Arc::new(JwtAuth::new(secret, ttl_seconds)),
        }
    }
}

/// Reject requests without a valid bearer token
///
/// On success the token's [`Claims`] are placed in the request extensions.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing or invalid Authorization header"))?;

    let token = JwtAuth::extract_bearer_token(auth_header)
        .map_err(|_| ApiError::unauthorized("Missing or invalid Authorization header"))?;

    let claims: Claims = state.jwt_auth.validate_token(token).map_err(|e| {
        debug!("Rejected token: {}", e);
        ApiError::unauthorized("Invalid token")
    })?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Tag every request with an id, taken from `x-request-id` or freshly generated
///
/// The id is recorded on a span wrapping the rest of the stack and echoed in
/// the response, including responses short-circuited by inner middleware.
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
