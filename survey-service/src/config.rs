//! Service configuration loaded from the environment
//!
//! `.env` is read first if present; real environment variables win.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use survey_cache::cache::start_auto_cleanup;
use survey_cache::{
    DisabledFastCache, DurableStore, FastCache, GeneratorConfig, LlmSurveyGenerator,
    MemoryCacheConfig, MemoryFastCache, MemorySurveyStore, Neo4jStoreConfig, Neo4jSurveyStore,
    OrchestratorConfig, RedisFastCache, RetryPolicy, SurveyCacheOrchestrator,
};
use thiserror::Error;

use crate::api::rate_limit::RateLimit;
use tracing::info;

/// Sweep interval for the in-process fast cache
const MEMORY_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Configuration errors
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{var} must be a number, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },

    #[error("RATE_LIMIT must look like '10/minute' or 'off', got '{0}'")]
    InvalidRateLimit(String),

    #[error("{var} has unknown value '{value}' (expected one of: {expected})")]
    UnknownValue {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Where fast-cache entries live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastCacheBackend {
    Redis,
    Memory,
    /// Durable tier only
    Disabled,
}

impl FromStr for FastCacheBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "redis" => Ok(FastCacheBackend::Redis),
            "memory" => Ok(FastCacheBackend::Memory),
            "none" | "disabled" | "db_only" => Ok(FastCacheBackend::Disabled),
            _ => Err(()),
        }
    }
}

/// Where durable records live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurableStoreBackend {
    Neo4j,
    Memory,
}

impl FromStr for DurableStoreBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "neo4j" => Ok(DurableStoreBackend::Neo4j),
            "memory" => Ok(DurableStoreBackend::Memory),
            _ => Err(()),
        }
    }
}

/// Full service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// Prefix for every route, e.g. `/api`
    pub api_prefix: String,
    pub jwt_secret: String,
    pub jwt_ttl_seconds: i64,
    pub dev_login_email: Option<String>,
    pub dev_login_password: Option<String>,
    pub request_timeout: Duration,
    /// Per-client limit on survey generation; `None` when turned off
    pub rate_limit: Option<RateLimit>,
    pub fast_cache: FastCacheBackend,
    pub redis_url: String,
    pub fast_cache_ttl: Duration,
    pub durable_store: DurableStoreBackend,
    pub neo4j: Neo4jStoreConfig,
    pub llm_api_url: String,
    pub llm_api_key: String,
    pub llm_model: String,
    pub llm_timeout: Duration,
    pub llm_max_attempts: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let generator = GeneratorConfig::default();
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            api_prefix: "/api".to_string(),
            jwt_secret: "default_secret_change_in_production".to_string(),
            jwt_ttl_seconds: 3600,
            dev_login_email: None,
            dev_login_password: None,
            request_timeout: Duration::from_secs(30),
            rate_limit: Some(RateLimit::default()),
            fast_cache: FastCacheBackend::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            fast_cache_ttl: Duration::from_secs(3600),
            durable_store: DurableStoreBackend::Memory,
            neo4j: Neo4jStoreConfig::default(),
            llm_api_url: generator.api_url,
            llm_api_key: String::new(),
            llm_model: generator.model,
            llm_timeout: generator.request_timeout,
            llm_max_attempts: generator.retry.max_attempts,
        }
    }
}

impl ServiceConfig {
    /// Load `.env`, then read the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source; unset variables keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let fast_cache = match get("FAST_CACHE_BACKEND") {
            Some(value) => value.parse().map_err(|_| ConfigError::UnknownValue {
                var: "FAST_CACHE_BACKEND",
                value,
                expected: "redis, memory, none",
            })?,
            // A configured Redis URL implies the Redis backend
            None if get("REDIS_URL").is_some() => FastCacheBackend::Redis,
            None => defaults.fast_cache,
        };

        let durable_store = match get("DURABLE_STORE_BACKEND") {
            Some(value) => value.parse().map_err(|_| ConfigError::UnknownValue {
                var: "DURABLE_STORE_BACKEND",
                value,
                expected: "neo4j, memory",
            })?,
            None => defaults.durable_store,
        };

        let rate_limit = match get("RATE_LIMIT") {
            Some(value) if matches!(value.trim().to_lowercase().as_str(), "off" | "none" | "disabled") => None,
            Some(value) => Some(value.parse().map_err(|_| ConfigError::InvalidRateLimit(value))?),
            None => defaults.rate_limit,
        };

        let neo4j = Neo4jStoreConfig {
            uri: get("NEO4J_URI").unwrap_or(defaults.neo4j.uri.clone()),
            user: get("NEO4J_USER").unwrap_or(defaults.neo4j.user.clone()),
            password: get("NEO4J_PASSWORD").unwrap_or(defaults.neo4j.password.clone()),
            database: get("NEO4J_DATABASE").unwrap_or(defaults.neo4j.database.clone()),
            ..defaults.neo4j.clone()
        };

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: parse_number(&get, "PORT", defaults.port)?,
            api_prefix: normalize_prefix(&get("API_PREFIX").unwrap_or(defaults.api_prefix)),
            jwt_secret: get("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            jwt_ttl_seconds: parse_number(&get, "JWT_TTL_SECONDS", defaults.jwt_ttl_seconds)?,
            dev_login_email: get("DEV_LOGIN_EMAIL"),
            dev_login_password: get("DEV_LOGIN_PASSWORD"),
            request_timeout: Duration::from_secs(parse_number(
                &get,
                "GLOBAL_REQUEST_TIMEOUT",
                defaults.request_timeout.as_secs(),
            )?),
            rate_limit,
            fast_cache,
            redis_url: get("REDIS_URL").unwrap_or(defaults.redis_url),
            fast_cache_ttl: Duration::from_secs(parse_number(
                &get,
                "REDIS_CACHE_TTL",
                defaults.fast_cache_ttl.as_secs(),
            )?),
            durable_store,
            neo4j,
            llm_api_url: get("LLM_API_URL").unwrap_or(defaults.llm_api_url),
            llm_api_key: get("LLM_API_KEY")
                .or_else(|| get("GROQ_API_KEY"))
                .unwrap_or(defaults.llm_api_key),
            llm_model: get("LLM_MODEL")
                .or_else(|| get("GROQ_MODEL"))
                .unwrap_or(defaults.llm_model),
            llm_timeout: Duration::from_secs(parse_number(
                &get,
                "LLM_TIMEOUT_SECONDS",
                defaults.llm_timeout.as_secs(),
            )?),
            llm_max_attempts: parse_number(&get, "LLM_MAX_ATTEMPTS", defaults.llm_max_attempts)?,
        })
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig::default()
            .with_fast_ttl(self.fast_cache_ttl)
            .with_request_timeout(self.request_timeout)
    }

    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig::new(self.llm_api_key.clone())
            .with_api_url(self.llm_api_url.clone())
            .with_model(self.llm_model.clone())
            .with_request_timeout(self.llm_timeout)
            .with_retry(RetryPolicy::generation().with_max_attempts(self.llm_max_attempts))
    }

    /// Construct the client handles and the orchestrator wired to them
    ///
    /// No connection is opened here; Redis and Neo4j connect on first use.
    pub fn build_orchestrator(&self) -> survey_cache::Result<SurveyCacheOrchestrator> {
        let fast_cache: Arc<dyn FastCache> = match self.fast_cache {
            FastCacheBackend::Redis => Arc::new(RedisFastCache::new(&self.redis_url)?),
            FastCacheBackend::Memory => {
                let cache = MemoryFastCache::new(MemoryCacheConfig::default());
                if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                    runtime.spawn(start_auto_cleanup(cache.clone(), MEMORY_CLEANUP_INTERVAL));
                }
                Arc::new(cache)
            }
            FastCacheBackend::Disabled => Arc::new(DisabledFastCache),
        };

        let store: Arc<dyn DurableStore> = match self.durable_store {
            DurableStoreBackend::Neo4j => Arc::new(Neo4jSurveyStore::new(self.neo4j.clone())),
            DurableStoreBackend::Memory => Arc::new(MemorySurveyStore::new()),
        };

        let generator = Arc::new(LlmSurveyGenerator::new(self.generator_config())?);

        info!(
            "Pipeline: fast cache {:?}, durable store {:?}, timeout {:?}",
            self.fast_cache, self.durable_store, self.request_timeout
        );
        Ok(SurveyCacheOrchestrator::new(
            fast_cache,
            store,
            generator,
            self.orchestrator_config(),
        ))
    }
}

fn parse_number<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
        None => Ok(default),
    }
}

/// `api/` and `/api/` both become `/api`; an empty prefix stays empty
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}
