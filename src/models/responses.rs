//! Response DTOs for the cache server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CacheStats;

/// Response body for the GET operation (GET /get/:key)
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    /// The requested key
    pub key: String,
    /// The stored value, decoded as UTF-8 (invalid sequences replaced)
    pub value: String,
}

impl GetResponse {
    /// Creates a new GetResponse from the raw payload
    pub fn new(key: impl Into<String>, payload: &[u8]) -> Self {
        Self {
            key: key.into(),
            value: String::from_utf8_lossy(payload).into_owned(),
        }
    }
}

/// Acknowledgement for SET, REFRESH and DELETE
#[derive(Debug, Clone, Serialize)]
pub struct KeyResponse {
    /// Success message
    pub message: String,
    /// The key the operation applied to
    pub key: String,
}

impl KeyResponse {
    /// Response for PUT /set
    pub fn set(key: impl Into<String>) -> Self {
        Self::with_verb(key, "set")
    }

    /// Response for POST /refresh/:key
    pub fn refreshed(key: impl Into<String>) -> Self {
        Self::with_verb(key, "refreshed")
    }

    /// Response for DELETE /del/:key
    pub fn removed(key: impl Into<String>) -> Self {
        Self::with_verb(key, "removed")
    }

    fn with_verb(key: impl Into<String>, verb: &str) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' {} successfully", key, verb),
            key,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: CacheStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            stats,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
