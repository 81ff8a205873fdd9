//! API Module
//!
//! HTTP handlers and routing over the cache.
//!
//! # Endpoints
//! - `POST /init` - Select a backing store kind
//! - `PUT /set` - Store a value
//! - `GET /get/:key` - Retrieve a value by key
//! - `DELETE /del/:key` - Remove a key
//! - `POST /flush`, `POST /flush-expired` - Bulk removal in the active bucket
//! - `PUT /bucket`, `DELETE /bucket` - Bucket selection
//! - `PUT /warnings` - Toggle warnings
//! - `GET /supported`, `GET /stats`, `GET /health`

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
