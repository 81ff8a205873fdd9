//! API Routes
//!
//! Configures the Axum router with all cache server endpoints.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    delete_handler, flush_expired_handler, flush_handler, get_handler, health_handler,
    init_handler, reset_bucket_handler, set_bucket_handler, set_handler, stats_handler,
    supported_handler, warnings_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `POST /init` - Select a backing store kind
/// - `PUT /set` - Store a value with optional TTL (minutes)
/// - `GET /get/:key` - Retrieve a value by key
/// - `DELETE /del/:key` - Remove a key
/// - `POST /flush` - Remove every entry of the active bucket
/// - `POST /flush-expired` - Remove expired entries of the active bucket
/// - `PUT /bucket`, `DELETE /bucket` - Switch or reset the active bucket
/// - `PUT /warnings` - Toggle warnings
/// - `GET /supported` - Whether the backing store is usable
/// - `GET /stats` - Cache statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/init", post(init_handler))
        .route("/set", put(set_handler))
        .route("/get/:key", get(get_handler))
        .route("/del/:key", delete(delete_handler))
        .route("/flush", post(flush_handler))
        .route("/flush-expired", post(flush_expired_handler))
        .route("/bucket", put(set_bucket_handler).delete(reset_bucket_handler))
        .route("/warnings", put(warnings_handler))
        .route("/supported", get(supported_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
