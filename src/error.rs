//! Error types for the table cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::ErrorResponse;
use crate::store::StoreError;

// == Cache Error Enum ==
/// Unified error type for the table cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// A required construction parameter is missing or empty
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An explicit absolute expiration was not in the future
    #[error("Absolute expiration {expiration} must be after {now}")]
    InvalidExpiration {
        expiration: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    /// A relative or sliding expiration was zero
    #[error("{option} must be positive")]
    InvalidDuration { option: &'static str },

    /// Key cannot be used as a row key
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Payload exceeds what a single row can hold
    #[error("Payload of {size} bytes exceeds maximum of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    /// Client or table initialization failed
    #[error("Connection failed: {0}")]
    Connection(String),

    /// A remote table operation failed
    #[error("Store operation failed: {0}")]
    Store(#[from] StoreError),

    /// The caller's cancellation token fired before completion
    #[error("Operation cancelled")]
    Cancelled,

    /// The blocking tier's runtime failed or is gone
    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidRequest(_)
            | CacheError::InvalidKey(_)
            | CacheError::InvalidExpiration { .. }
            | CacheError::InvalidDuration { .. }
            | CacheError::PayloadTooLarge { .. } => StatusCode::BAD_REQUEST,
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::Store(_) => StatusCode::BAD_GATEWAY,
            CacheError::Connection(_) | CacheError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Configuration(_) | CacheError::Runtime(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the table cache.
pub type Result<T> = std::result::Result<T, CacheError>;
