//! API routes for the survey service

use axum::{
    extract::State,
    http::{HeaderName, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use survey_cache::{HealthCheckResult, SurveyCacheOrchestrator, SurveySource};
use tracing::info;

use super::auth::{Claims, DEVELOPER_ROLE};
use super::error::ApiError;
use super::middleware::AuthState;

/// Response header naming the tier that served a survey
pub const SURVEY_SOURCE_HEADER: HeaderName = HeaderName::from_static("x-survey-source");

/// Credentials accepted by the dev login
#[derive(Debug, Clone)]
pub struct DevLogin {
    pub email: String,
    pub password: String,
}

/// Application state
pub struct AppState {
    pub orchestrator: SurveyCacheOrchestrator,
    pub auth: AuthState,
    /// `None` disables the login endpoint
    pub dev_login: Option<DevLogin>,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub fast_cache: String,
    pub durable_store: HealthCheckResult,
}

/// Login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response
#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Survey generation request
#[derive(Deserialize)]
pub struct GenerateRequest {
    pub description: String,
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store = state.orchestrator.store_health().await;
    let status = StatusCode::from_u16(store.status.to_http_status_code())
        .unwrap_or(StatusCode::SERVICE_UNAVAILABLE);

    let body = HealthResponse {
        status: (if status.is_success() { "healthy" } else { "unhealthy" }).to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        fast_cache: state.orchestrator.fast_cache_backend().to_string(),
        durable_store: store,
    };
    (status, Json(body))
}

/// Dev login: exchanges the configured credentials for a bearer token
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("email and password are required"));
    }

    let dev_login = state
        .dev_login
        .as_ref()
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;
    if payload.email != dev_login.email || payload.password != dev_login.password {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let jwt_auth = &state.auth.jwt_auth;
    let access_token = jwt_auth
        .generate_token(&payload.email, Some(DEVELOPER_ROLE))
        .map_err(|e| ApiError::internal(e.to_string()))?;

    info!("Issued dev token for {}", payload.email);
    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer".to_string(),
        expires_in: jwt_auth.ttl_seconds(),
    }))
}

/// Protected survey generation endpoint
///
/// `201 Created` for a freshly generated survey, `200 OK` when served from a
/// cache tier.
pub async fn generate_survey(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<GenerateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .orchestrator
        .get_or_create_survey(&payload.description)
        .await?;

    info!(
        "Survey for {} served from {} (key {})",
        claims.sub, outcome.source, outcome.key
    );

    let status = match outcome.source {
        SurveySource::Generated => StatusCode::CREATED,
        SurveySource::FastCache | SurveySource::DurableStore => StatusCode::OK,
    };

    Ok((
        status,
        [(SURVEY_SOURCE_HEADER, outcome.source.as_str())],
        Json(outcome.document),
    ))
}
