//! Durable store health reporting

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Health status of a durable store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Store is responsive
    Healthy,
    /// Store is responsive but slower than the degraded threshold
    Degraded,
    /// Store is not responsive or erroring
    Unhealthy,
}

impl HealthStatus {
    /// HTTP status code equivalent
    pub fn to_http_status_code(&self) -> u16 {
        match self {
            HealthStatus::Healthy => 200,
            HealthStatus::Degraded => 200,
            HealthStatus::Unhealthy => 503,
        }
    }

    /// Healthy or degraded
    pub fn is_operational(&self) -> bool {
        matches!(self, HealthStatus::Healthy | HealthStatus::Degraded)
    }
}

/// Result of one health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    /// Backend that was checked ("neo4j", "memory", ...)
    pub backend: String,
    pub response_time_ms: u64,
    /// Database name, when the backend reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_name: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthCheckResult {
    /// Responsive backend; degraded when slower than `degraded_threshold_ms`
    pub fn healthy(
        backend: &str,
        response_time: Duration,
        database_name: Option<String>,
        degraded_threshold_ms: u64,
    ) -> Self {
        let response_time_ms = response_time.as_millis() as u64;
        let status = if response_time_ms > degraded_threshold_ms {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        Self {
            status,
            backend: backend.to_string(),
            response_time_ms,
            database_name,
            timestamp: Utc::now(),
            error: None,
        }
    }

    /// Failed check
    pub fn unhealthy(backend: &str, response_time: Duration, error: &str) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            backend: backend.to_string(),
            response_time_ms: response_time.as_millis() as u64,
            database_name: None,
            timestamp: Utc::now(),
            error: Some(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status_http_codes() {
        assert_eq!(HealthStatus::Healthy.to_http_status_code(), 200);
        assert_eq!(HealthStatus::Degraded.to_http_status_code(), 200);
        assert_eq!(HealthStatus::Unhealthy.to_http_status_code(), 503);
        assert!(!HealthStatus::Unhealthy.is_operational());
    }

    #[test]
    fn test_slow_check_is_degraded() {
        let fast = HealthCheckResult::healthy("neo4j", Duration::from_millis(50), None, 1000);
        assert_eq!(fast.status, HealthStatus::Healthy);

        let slow = HealthCheckResult::healthy("neo4j", Duration::from_millis(1500), None, 1000);
        assert_eq!(slow.status, HealthStatus::Degraded);
        assert_eq!(slow.response_time_ms, 1500);
    }

    #[test]
    fn test_unhealthy_serializes_error() {
        let result = HealthCheckResult::unhealthy("neo4j", Duration::from_millis(10), "refused");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "unhealthy");
        assert_eq!(json["error"], "refused");
        assert!(json.get("database_name").is_none());
    }
}
