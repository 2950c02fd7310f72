//! API server for the survey service

use anyhow::Result;
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use survey_cache::SurveyCacheOrchestrator;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::ServiceConfig;

use super::middleware::{auth_middleware, request_id_middleware, AuthState};
use super::rate_limit::{rate_limit_middleware, ClientRateLimiter, RateLimit};
use super::routes::{generate_survey, health_check, login, AppState, DevLogin};

/// Configuration for the API server
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub host: String,
    pub port: u16,
    pub api_prefix: String,
    pub jwt_secret: String,
    pub jwt_ttl_seconds: i64,
    pub dev_login: Option<DevLogin>,
    /// Per-client budget on survey generation; `None` disables limiting
    pub rate_limit: Option<RateLimit>,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self::from(&ServiceConfig::default())
    }
}

impl From<&ServiceConfig> for ApiServerConfig {
    fn from(config: &ServiceConfig) -> Self {
        let dev_login = match (&config.dev_login_email, &config.dev_login_password) {
            (Some(email), Some(password)) => Some(DevLogin {
                email: email.clone(),
                password: password.clone(),
            }),
            _ => None,
        };

        Self {
            host: config.host.clone(),
            port: config.port,
            api_prefix: config.api_prefix.clone(),
            jwt_secret: config.jwt_secret.clone(),
            jwt_ttl_seconds: config.jwt_ttl_seconds,
            dev_login,
            rate_limit: config.rate_limit,
        }
    }
}

/// API server
pub struct ApiServer {
    config: ApiServerConfig,
    orchestrator: SurveyCacheOrchestrator,
}

impl ApiServer {
    /// Create a new API server around an orchestrator
    pub fn new(config: ApiServerConfig, orchestrator: SurveyCacheOrchestrator) -> Self {
        Self {
            config,
            orchestrator,
        }
    }

    /// Build the router
    ///
    /// `{prefix}/health` and `{prefix}/auth/token` are public, everything
    /// else requires a bearer token.
    pub fn router(&self) -> Router {
        let auth_state = AuthState::new(&self.config.jwt_secret, self.config.jwt_ttl_seconds);
        let app_state = Arc::new(AppState {
            orchestrator: self.orchestrator.clone(),
            auth: auth_state.clone(),
            dev_login: self.config.dev_login.clone(),
        });
        let prefix = &self.config.api_prefix;

        // Layers run outermost-last, so auth resolves the client before limiting
        let mut generate = post(generate_survey);
        if let Some(limit) = self.config.rate_limit {
            info!("Rate limiting survey generation to {} per client", limit);
            generate = generate.route_layer(from_fn_with_state(
                ClientRateLimiter::new(limit),
                rate_limit_middleware,
            ));
        }
        let generate = generate.route_layer(from_fn_with_state(auth_state, auth_middleware));

        Router::new()
            // Public routes
            .route(&format!("{}/health", prefix), get(health_check))
            .route(&format!("{}/auth/token", prefix), post(login))
            // Protected routes
            .route(&format!("{}/surveys/generate", prefix), generate)
            .with_state(app_state)
            .layer(
                ServiceBuilder::new()
                    .layer(from_fn(request_id_middleware))
                    .layer(CorsLayer::permissive()),
            )
    }

    /// Serve on an already bound listener
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let app = self.router();
        info!("Starting API server on {}", listener.local_addr()?);
        axum::serve(listener, app).await?;
        Ok(())
    }

    /// Bind the configured address and serve
    pub async fn start(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        self.serve(listener).await
    }
}
