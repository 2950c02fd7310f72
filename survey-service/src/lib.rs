//! # Survey Service (survey-service)
//!
//! HTTP transport and CLI around the `survey-cache` pipeline: JWT-protected
//! survey generation, a dev login, health reporting and request-id tracing.

pub mod api;
pub mod config;

pub use api::{ApiServer, AppState, AuthState, JwtAuth};
pub use api::server::ApiServerConfig;
pub use config::{ConfigError, DurableStoreBackend, FastCacheBackend, ServiceConfig};
