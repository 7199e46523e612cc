//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use tokio_util::sync::CancellationToken;

use crate::cache::DistributedCache;
use crate::error::{CacheError, Result};
use crate::models::{GetResponse, HealthResponse, KeyResponse, SetRequest, StatsResponse};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The cache behind every endpoint
    pub cache: Arc<dyn DistributedCache>,
    /// Cancelled at shutdown to abandon in-flight table calls
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Creates a new AppState around `cache`.
    pub fn new(cache: Arc<dyn DistributedCache>) -> Self {
        Self::with_shutdown(cache, CancellationToken::new())
    }

    pub fn with_shutdown(cache: Arc<dyn DistributedCache>, shutdown: CancellationToken) -> Self {
        Self { cache, shutdown }
    }
}

/// Handler for PUT /set
///
/// Stores a value in the cache with optional expiration settings.
pub async fn set_handler(State(state): State<AppState>, Json(req): Json<SetRequest>) -> Result<Json<KeyResponse>> {
    // Validate request
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    state
        .cache
        .set(&req.key, req.value.as_bytes(), &req.options(), &state.shutdown)
        .await?;

    Ok(Json(KeyResponse::set(req.key)))
}

/// Handler for GET /get/:key
///
/// Retrieves a value from the cache by key, renewing its sliding window.
pub async fn get_handler(State(state): State<AppState>, Path(key): Path<String>) -> Result<Json<GetResponse>> {
    match state.cache.get(&key, &state.shutdown).await? {
        Some(payload) => Ok(Json(GetResponse::new(key, &payload))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for POST /refresh/:key
///
/// Renews the sliding window of a key without reading it; evicts it if expired.
pub async fn refresh_handler(State(state): State<AppState>, Path(key): Path<String>) -> Result<Json<KeyResponse>> {
    state.cache.refresh(&key, &state.shutdown).await?;

    Ok(Json(KeyResponse::refreshed(key)))
}

/// Handler for DELETE /del/:key
///
/// Deletes a key from the cache. Deleting an absent key succeeds.
pub async fn delete_handler(State(state): State<AppState>, Path(key): Path<String>) -> Result<Json<KeyResponse>> {
    state.cache.remove(&key, &state.shutdown).await?;

    Ok(Json(KeyResponse::removed(key)))
}

/// Handler for GET /stats
///
/// Returns current cache statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.cache.stats()))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
