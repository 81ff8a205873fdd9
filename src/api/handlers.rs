//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::sync::Arc;
use tokio::sync::RwLock;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::cache::{Cache, InitReport};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    BucketRequest, BucketResponse, DeleteResponse, FlushResponse, GetResponse, HealthResponse,
    SetRequest, SetResponse, StatsResponse, SupportedResponse, WarningsRequest, WarningsResponse,
};

/// Application state shared across all handlers.
///
/// Every cache operation takes the write lock, so operations run one at a time.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<RwLock<Cache>>,
}

impl AppState {
    /// Creates a new AppState with the given cache.
    pub fn new(cache: Cache) -> Self {
        Self {
            cache: Arc::new(RwLock::new(cache)),
        }
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(Cache::from_config(config)?))
    }
}

/// Handler for POST /init
///
/// Accepts `{"storageKind": ...}`; any other key is rejected with 400.
pub async fn init_handler(
    State(state): State<AppState>,
    Json(options): Json<Value>,
) -> Result<Json<InitReport>> {
    let mut cache = state.cache.write().await;
    let report = cache.init_from_json(options)?;
    Ok(Json(report))
}

/// Handler for PUT /set
///
/// Stores any JSON value with an optional TTL in minutes. A dropped write is
/// reported through `stored: false`, not as an error.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidKey(error_msg));
    }

    let mut cache = state.cache.write().await;
    let stored = cache.set(&req.key, &req.value, req.ttl);

    Ok(Json(SetResponse::new(req.key, stored)))
}

/// Handler for GET /get/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    // Write lock: reads may delete expired entries
    let mut cache = state.cache.write().await;
    let value = cache
        .get(&key)
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for DELETE /del/:key
///
/// Succeeds whether or not the key existed.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<DeleteResponse> {
    let mut cache = state.cache.write().await;
    cache.remove(&key);

    Json(DeleteResponse::new(key))
}

/// Handler for POST /flush
pub async fn flush_handler(State(state): State<AppState>) -> Json<FlushResponse> {
    let mut cache = state.cache.write().await;
    let removed = cache.flush();

    Json(FlushResponse {
        bucket: cache.bucket().to_string(),
        removed,
    })
}

/// Handler for POST /flush-expired
pub async fn flush_expired_handler(State(state): State<AppState>) -> Json<FlushResponse> {
    let mut cache = state.cache.write().await;
    let removed = cache.flush_expired();

    Json(FlushResponse {
        bucket: cache.bucket().to_string(),
        removed,
    })
}

/// Handler for PUT /bucket
pub async fn set_bucket_handler(
    State(state): State<AppState>,
    Json(req): Json<BucketRequest>,
) -> Json<BucketResponse> {
    let mut cache = state.cache.write().await;
    cache.set_bucket(&req.name);

    Json(BucketResponse { bucket: req.name })
}

/// Handler for DELETE /bucket
pub async fn reset_bucket_handler(State(state): State<AppState>) -> Json<BucketResponse> {
    let mut cache = state.cache.write().await;
    cache.reset_bucket();

    Json(BucketResponse {
        bucket: String::new(),
    })
}

/// Handler for PUT /warnings
pub async fn warnings_handler(
    State(state): State<AppState>,
    Json(req): Json<WarningsRequest>,
) -> Json<WarningsResponse> {
    let mut cache = state.cache.write().await;
    cache.enable_warnings(req.enabled);

    Json(WarningsResponse {
        enabled: req.enabled,
    })
}

/// Handler for GET /supported
pub async fn supported_handler(State(state): State<AppState>) -> Json<SupportedResponse> {
    // Write lock: the first call may run the store probe
    let mut cache = state.cache.write().await;

    Json(SupportedResponse {
        supported: cache.supported(),
    })
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let cache = state.cache.read().await;
    Json(StatsResponse::from(cache.stats()))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
