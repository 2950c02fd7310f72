//! Redis-backed fast cache
//!
//! One `ConnectionManager` is created on first use and shared by every
//! request; it reconnects on its own after a dropped connection. Only
//! connection-class failures are retried, a wrong-type reply or similar is
//! returned immediately.

use crate::cache::FastCache;
use crate::error::{Result, SurveyError};
use crate::key::CacheKey;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, RedisError};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Default deadline for one attempt, connecting included
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(2);

/// Fast cache backed by a shared Redis instance
pub struct RedisFastCache {
    client: Client,
    connection: OnceCell<ConnectionManager>,
    retry: RetryPolicy,
    operation_timeout: Duration,
    display_url: String,
}

impl RedisFastCache {
    /// Create a cache for `url`. No connection is made until the first command.
    pub fn new(url: &str) -> Result<Self> {
        let client = Client::open(url)
            .map_err(|e| SurveyError::Config(format!("invalid Redis URL: {}", e)))?;

        Ok(Self {
            client,
            connection: OnceCell::new(),
            retry: RetryPolicy::fast_cache(),
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            display_url: redact_url(url),
        })
    }

    /// Override the retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Override the per-command deadline
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    async fn connection(&self) -> std::result::Result<ConnectionManager, RedisError> {
        let manager = self
            .connection
            .get_or_try_init(|| async {
                info!("Connecting to Redis fast cache at {}", self.display_url);
                ConnectionManager::new(self.client.clone()).await
            })
            .await?;
        Ok(manager.clone())
    }

    async fn get_once(&self, cache_key: &str) -> std::result::Result<Option<Vec<u8>>, RedisError> {
        with_deadline(self.operation_timeout, async {
            let mut conn = self.connection().await?;
            redis::cmd("GET").arg(cache_key).query_async(&mut conn).await
        })
        .await
    }

    async fn set_once(
        &self,
        cache_key: &str,
        ttl_secs: u64,
        value: &[u8],
    ) -> std::result::Result<(), RedisError> {
        with_deadline(self.operation_timeout, async {
            let mut conn = self.connection().await?;
            redis::cmd("SETEX")
                .arg(cache_key)
                .arg(ttl_secs)
                .arg(value)
                .query_async(&mut conn)
                .await
        })
        .await
    }
}

#[async_trait]
impl FastCache for RedisFastCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let cache_key = key.fast_cache_key();

        let value = self
            .retry
            .run("redis GET", || self.get_once(&cache_key), is_retryable)
            .await
            .map_err(|e| SurveyError::CacheUnavailable(e.to_string()))?;

        debug!(
            "Redis {}: {}",
            if value.is_some() { "hit" } else { "miss" },
            cache_key
        );
        Ok(value)
    }

    async fn set_with_ttl(&self, key: &CacheKey, ttl: Duration, value: Vec<u8>) -> Result<()> {
        let cache_key = key.fast_cache_key();
        // SETEX rejects a zero expiry
        let ttl_secs = ttl.as_secs().max(1);

        self.retry
            .run(
                "redis SETEX",
                || self.set_once(&cache_key, ttl_secs, &value),
                is_retryable,
            )
            .await
            .map_err(|e| SurveyError::CacheUnavailable(e.to_string()))?;

        debug!("Redis set: {} (ttl {}s)", cache_key, ttl_secs);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

async fn with_deadline<T, F>(deadline: Duration, command: F) -> std::result::Result<T, RedisError>
where
    F: std::future::Future<Output = std::result::Result<T, RedisError>>,
{
    match tokio::time::timeout(deadline, command).await {
        Ok(result) => result,
        Err(_) => Err(RedisError::from(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("redis command exceeded {:?}", deadline),
        ))),
    }
}

fn is_retryable(e: &RedisError) -> bool {
    e.is_io_error() || e.is_connection_refusal() || e.is_timeout() || e.is_connection_dropped()
}

/// Strip credentials from a Redis URL for logging
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***@{}", &url[..scheme_end], &url[at + 1..])
        }
        _ => url.to_string(),
    }
}
