//! Per-client rate limiting for protected routes
//!
//! Each bearer-token subject gets its own token bucket. The middleware must
//! sit inside the auth layer so the request already carries [`Claims`].

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    DefaultKeyedRateLimiter, Quota, RateLimiter,
};
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::auth::Claims;
use super::error::ApiError;

/// Allowed requests per window, written like `10/minute`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub requests: NonZeroU32,
    pub period: Duration,
}

impl RateLimit {
    pub fn per_minute(requests: NonZeroU32) -> Self {
        Self {
            requests,
            period: Duration::from_secs(60),
        }
    }

    /// Token bucket holding `requests` tokens, refilled evenly over `period`
    pub fn quota(&self) -> Quota {
        let replenish = self.period / self.requests.get();
        Quota::with_period(replenish)
            .unwrap_or_else(|| Quota::per_second(self.requests))
            .allow_burst(self.requests)
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::per_minute(NonZeroU32::MIN.saturating_add(9))
    }
}

impl fmt::Display for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}s", self.requests, self.period.as_secs())
    }
}

impl FromStr for RateLimit {
    type Err = ();

    /// Accepts `N/second`, `N/minute`, `N/hour`, `N/day` and `N per minute`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let (count, unit) = lower
            .split_once('/')
            .or_else(|| lower.split_once(" per "))
            .ok_or(())?;

        let requests = count.trim().parse::<NonZeroU32>().map_err(|_| ())?;
        let seconds = match unit.trim().trim_end_matches('s') {
            "second" | "sec" => 1,
            "minute" | "min" => 60,
            "hour" => 3600,
            "day" => 86_400,
            _ => return Err(()),
        };

        Ok(Self {
            requests,
            period: Duration::from_secs(seconds),
        })
    }
}

/// Keyed limiter shared by every request to the protected routes
#[derive(Clone)]
pub struct ClientRateLimiter {
    limiter: Arc<DefaultKeyedRateLimiter<String>>,
}

impl ClientRateLimiter {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::keyed(limit.quota())),
        }
    }

    /// Take one token for `client`, or report how long until one is free
    pub fn check(&self, client: &str) -> Result<(), Duration> {
        self.limiter
            .check_key(&client.to_string())
            .map_err(|not_until| not_until.wait_time_from(DefaultClock::default().now()))
    }
}

/// Reject requests from clients that spent their budget with `429`
pub async fn rate_limit_middleware(
    State(limiter): State<ClientRateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let client = request
        .extensions()
        .get::<Claims>()
        .map(|claims| claims.sub.clone())
        .unwrap_or_else(|| "anonymous".to_string());

    match limiter.check(&client) {
        Ok(()) => next.run(request).await,
        Err(wait) => {
            warn!("Rate limit exceeded for {}", client);
            let retry_after = wait.as_secs().max(1).to_string();
            let mut response = ApiError::rate_limited().into_response();
            if let Ok(value) = HeaderValue::from_str(&retry_after) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
            response
        }
    }
}
