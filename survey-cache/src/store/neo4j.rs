//! Neo4j-backed durable store
//!
//! Each record is a `(:CachedSurvey)` node keyed by the prompt hash. A
//! uniqueness constraint on `key` backs `insert_if_absent`: the write is a
//! `MERGE ... ON CREATE SET` stamped with a per-call token, so the caller can
//! tell whether its own write created the node.

use crate::error::{Result, SurveyError};
use crate::key::CacheKey;
use crate::retry::RetryPolicy;
use crate::schema::{CacheRecord, InsertOutcome};
use crate::store::{DurableStore, HealthCheckResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use neo4rs::{query, ConfigBuilder, Graph};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const SCHEMA_CONSTRAINT: &str = "CREATE CONSTRAINT cached_survey_key IF NOT EXISTS \
     FOR (s:CachedSurvey) REQUIRE s.key IS UNIQUE";

const FIND_BY_KEY: &str = "MATCH (s:CachedSurvey {key: $key})
     RETURN s.raw_prompt AS raw_prompt, s.payload AS payload, s.created_at AS created_at
     LIMIT 1";

const INSERT_IF_ABSENT: &str = "MERGE (s:CachedSurvey {key: $key})
     ON CREATE SET s.raw_prompt = $raw_prompt,
                   s.payload = $payload,
                   s.created_at = $created_at,
                   s.write_id = $write_id
     RETURN s.write_id = $write_id AS inserted";

/// Connection settings for [`Neo4jSurveyStore`]
#[derive(Debug, Clone)]
pub struct Neo4jStoreConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: usize,
    pub fetch_size: usize,
    /// Deadline for one attempt of one query, connecting included
    pub operation_timeout: Duration,
    /// Health checks slower than this report `Degraded`
    pub degraded_threshold_ms: u64,
}

impl Default for Neo4jStoreConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "password".to_string(),
            database: "neo4j".to_string(),
            max_connections: 16,
            fetch_size: 500,
            operation_timeout: Duration::from_secs(5),
            degraded_threshold_ms: 1000,
        }
    }
}

/// Durable store backed by Neo4j
///
/// The connection pool is created on first use and shared afterwards; a
/// failed connect leaves the store unconnected so the next call tries again.
pub struct Neo4jSurveyStore {
    config: Neo4jStoreConfig,
    graph: OnceCell<Graph>,
    retry: RetryPolicy,
}

/// Classified failure of one store attempt
#[derive(Debug)]
enum StoreFailure {
    /// Lock timeouts, dropped connections, deadlines: worth another attempt
    Transient(String),
    /// Bad config, bad query, unreadable row
    Permanent(String),
    /// A racing writer hit the uniqueness constraint first
    Conflict,
}

impl StoreFailure {
    fn is_transient(&self) -> bool {
        matches!(self, StoreFailure::Transient(_))
    }

    fn from_neo4j(context: &str, e: neo4rs::Error) -> Self {
        let message = format!("{}: {}", context, e);
        let lost_connection = matches!(
            e,
            neo4rs::Error::IOError { .. } | neo4rs::Error::ConnectionError
        );

        if is_constraint_violation(&message) {
            StoreFailure::Conflict
        } else if lost_connection || is_transient_status(&message) {
            StoreFailure::Transient(message)
        } else {
            StoreFailure::Permanent(message)
        }
    }
}

impl fmt::Display for StoreFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreFailure::Transient(msg) | StoreFailure::Permanent(msg) => f.write_str(msg),
            StoreFailure::Conflict => f.write_str("uniqueness constraint violated"),
        }
    }
}

fn is_constraint_violation(message: &str) -> bool {
    message.contains("ConstraintValidationFailed") || message.contains("already exists with label")
}

/// Server-side failures Neo4j itself marks as safe to retry
fn is_transient_status(message: &str) -> bool {
    message.contains("Neo.TransientError.")
}

impl Neo4jSurveyStore {
    /// Create a store. No connection is made until the first query.
    pub fn new(config: Neo4jStoreConfig) -> Self {
        Self {
            config,
            graph: OnceCell::new(),
            retry: RetryPolicy::durable_store(),
        }
    }

    /// Override the retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &Neo4jStoreConfig {
        &self.config
    }

    async fn graph(&self) -> std::result::Result<&Graph, StoreFailure> {
        self.graph
            .get_or_try_init(|| async {
                info!(
                    "Connecting to Neo4j at {} (database: {})",
                    self.config.uri, self.config.database
                );

                let config = ConfigBuilder::default()
                    .uri(self.config.uri.as_str())
                    .user(self.config.user.as_str())
                    .password(self.config.password.as_str())
                    .db(self.config.database.as_str())
                    .fetch_size(self.config.fetch_size)
                    .max_connections(self.config.max_connections)
                    .build()
                    .map_err(|e| StoreFailure::Permanent(format!("invalid Neo4j config: {}", e)))?;

                let graph = Graph::connect(config)
                    .await
                    .map_err(|e| StoreFailure::Transient(format!("Neo4j connect failed: {}", e)))?;

                if let Err(e) = graph.run(query(SCHEMA_CONSTRAINT)).await {
                    warn!("Could not ensure CachedSurvey key constraint: {}", e);
                }

                info!("Connected to Neo4j");
                Ok::<_, StoreFailure>(graph)
            })
            .await
    }

    /// Create the uniqueness constraint on `(:CachedSurvey).key`
    ///
    /// Also attempted once on first connect; calling it again is harmless.
    pub async fn ensure_schema(&self) -> Result<()> {
        let graph = self.graph().await.map_err(into_unavailable)?;
        graph
            .run(query(SCHEMA_CONSTRAINT))
            .await
            .map_err(|e| SurveyError::StoreUnavailable(format!("Failed to create constraint: {}", e)))?;
        debug!("CachedSurvey key constraint in place");
        Ok(())
    }

    async fn with_deadline<T, F>(&self, context: &str, attempt: F) -> std::result::Result<T, StoreFailure>
    where
        F: std::future::Future<Output = std::result::Result<T, StoreFailure>>,
    {
        match tokio::time::timeout(self.config.operation_timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(StoreFailure::Transient(format!(
                "{} timed out after {:?}",
                context, self.config.operation_timeout
            ))),
        }
    }

    async fn find_once(&self, key: &CacheKey) -> std::result::Result<Option<CacheRecord>, StoreFailure> {
        self.with_deadline("find_by_key", async {
            let graph = self.graph().await?;
            let cypher = query(FIND_BY_KEY).param("key", key.as_str());

            let mut result = graph
                .execute(cypher)
                .await
                .map_err(|e| StoreFailure::from_neo4j("Failed to query survey", e))?;

            let row = match result
                .next()
                .await
                .map_err(|e| StoreFailure::from_neo4j("Failed to read survey row", e))?
            {
                Some(row) => row,
                None => return Ok(None),
            };

            let raw_prompt: String = row
                .get("raw_prompt")
                .map_err(|e| StoreFailure::Permanent(format!("Failed to extract raw_prompt: {}", e)))?;
            let payload: String = row
                .get("payload")
                .map_err(|e| StoreFailure::Permanent(format!("Failed to extract payload: {}", e)))?;
            let created_at_str: String = row
                .get("created_at")
                .map_err(|e| StoreFailure::Permanent(format!("Failed to extract created_at: {}", e)))?;

            let created_at = DateTime::parse_from_rfc3339(&created_at_str)
                .map_err(|e| StoreFailure::Permanent(format!("Failed to parse created_at: {}", e)))?
                .with_timezone(&Utc);

            Ok::<_, StoreFailure>(Some(CacheRecord {
                key: key.clone(),
                raw_prompt,
                payload: payload.into_bytes(),
                created_at,
            }))
        })
        .await
    }

    async fn insert_once(&self, record: &CacheRecord) -> std::result::Result<InsertOutcome, StoreFailure> {
        self.with_deadline("insert_if_absent", async {
            let graph = self.graph().await?;
            let write_id = Uuid::new_v4().to_string();

            let cypher = query(INSERT_IF_ABSENT)
                .param("key", record.key.as_str())
                .param("raw_prompt", record.raw_prompt.as_str())
                .param("payload", String::from_utf8_lossy(&record.payload).into_owned())
                .param("created_at", record.created_at.to_rfc3339())
                .param("write_id", write_id);

            let mut result = graph
                .execute(cypher)
                .await
                .map_err(|e| StoreFailure::from_neo4j("Failed to insert survey", e))?;

            let row = result
                .next()
                .await
                .map_err(|e| StoreFailure::from_neo4j("Failed to read insert result", e))?
                .ok_or_else(|| StoreFailure::Permanent("MERGE returned no row".to_string()))?;

            let inserted: bool = row
                .get("inserted")
                .map_err(|e| StoreFailure::Permanent(format!("Failed to extract insert flag: {}", e)))?;

            Ok::<_, StoreFailure>(if inserted {
                InsertOutcome::Inserted
            } else {
                InsertOutcome::AlreadyExists
            })
        })
        .await
    }

    /// Simple health check using `RETURN 1`
    pub async fn health_check(&self) -> Result<bool> {
        debug!("Executing simple health check (RETURN 1)");
        self.with_deadline("health_check", async {
            let graph = self.graph().await?;
            graph
                .run(query("RETURN 1"))
                .await
                .map_err(|e| StoreFailure::from_neo4j("Health check failed", e))
        })
        .await
        .map_err(into_unavailable)?;
        Ok(true)
    }

    /// Detailed health check using `CALL db.info()`
    ///
    /// Never fails; problems are reported as `Unhealthy`.
    pub async fn health_check_detailed(&self) -> HealthCheckResult {
        debug!("Executing detailed health check (CALL db.info())");
        let start = Instant::now();

        let outcome = self
            .with_deadline("health_check_detailed", async {
                let graph = self.graph().await?;
                let mut result = graph
                    .execute(query("CALL db.info()"))
                    .await
                    .map_err(|e| StoreFailure::from_neo4j("Query execution failed", e))?;
                let row = result
                    .next()
                    .await
                    .map_err(|e| StoreFailure::from_neo4j("Failed to read results", e))?
                    .ok_or_else(|| {
                        StoreFailure::Permanent("No result returned from db.info()".to_string())
                    })?;
                Ok::<_, StoreFailure>(row.get::<String>("name").ok())
            })
            .await;

        let elapsed = start.elapsed();
        match outcome {
            Ok(database_name) => {
                debug!("Detailed health check passed ({}ms)", elapsed.as_millis());
                HealthCheckResult::healthy(
                    "neo4j",
                    elapsed,
                    database_name,
                    self.config.degraded_threshold_ms,
                )
            }
            Err(e) => {
                error!("Detailed health check failed: {}", e);
                HealthCheckResult::unhealthy("neo4j", elapsed, &e.to_string())
            }
        }
    }
}

fn into_unavailable(e: StoreFailure) -> SurveyError {
    SurveyError::StoreUnavailable(e.to_string())
}

#[async_trait]
impl DurableStore for Neo4jSurveyStore {
    async fn find_by_key(&self, key: &CacheKey) -> Result<Option<CacheRecord>> {
        let record = self
            .retry
            .run("neo4j find_by_key", || self.find_once(key), StoreFailure::is_transient)
            .await
            .map_err(into_unavailable)?;

        debug!(
            "Durable {}: {}",
            if record.is_some() { "hit" } else { "miss" },
            key
        );
        Ok(record)
    }

    async fn insert_if_absent(&self, record: &CacheRecord) -> Result<InsertOutcome> {
        let outcome = self
            .retry
            .run(
                "neo4j insert_if_absent",
                || self.insert_once(record),
                StoreFailure::is_transient,
            )
            .await;

        match outcome {
            Ok(outcome) => {
                debug!("Durable insert for {}: {:?}", record.key, outcome);
                Ok(outcome)
            }
            Err(StoreFailure::Conflict) => {
                debug!("Durable insert for {} lost the race", record.key);
                Ok(InsertOutcome::AlreadyExists)
            }
            Err(e) => Err(into_unavailable(e)),
        }
    }

    async fn health(&self) -> HealthCheckResult {
        self.health_check_detailed().await
    }

    fn backend_name(&self) -> &'static str {
        "neo4j"
    }
}
