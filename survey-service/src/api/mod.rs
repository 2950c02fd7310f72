//! HTTP API for the survey service

pub mod auth;
pub mod error;
pub mod middleware;
pub mod rate_limit;
pub mod routes;
pub mod server;

pub use auth::{Claims, JwtAuth};
pub use error::ApiError;
pub use middleware::AuthState;
pub use rate_limit::{ClientRateLimiter, RateLimit};
pub use routes::AppState;
pub use server::ApiServer;
