//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::cache::StoreError;

// == Cache Error Enum ==
/// Unified error type for the cache.
///
/// Most variants never leave the [`Cache`](crate::cache::Cache) facade: they are
/// logged and absorbed there. `UnknownOption` is the exception.
#[derive(Error, Debug)]
pub enum CacheError {
    /// No usable backing store is selected
    #[error("Backing store unavailable")]
    StoreUnavailable,

    /// Value could not be serialized for storage
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Write could not fit even after evicting every owned entry
    #[error("Capacity exceeded while writing key: {0}")]
    CapacityExceeded(String),

    /// `init` was given an option it does not recognize
    #[error("Unknown option: {0}")]
    UnknownOption(String),

    /// Key cannot be stored without aliasing another record
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Key not present (or expired) in the active bucket
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Any other backing store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::UnknownOption(_) | CacheError::InvalidKey(_) => StatusCode::BAD_REQUEST,
            CacheError::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Serialization(_)
            | CacheError::CapacityExceeded(_)
            | CacheError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
