//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use quota_cache::{
    api::create_router,
    cache::{Cache, ManualClock, StoreRegistry},
    AppState, Config,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

// == Helper Functions ==

fn create_test_app() -> Router {
    let cache = Cache::new(StoreRegistry::in_memory(64 * 1024));
    create_router(AppState::new(cache))
}

fn create_test_app_with_clock() -> (Router, ManualClock) {
    let clock = ManualClock::new(1_000.0);
    let cache = Cache::with_clock(StoreRegistry::in_memory(64 * 1024), Arc::new(clock.clone()));
    (create_router(AppState::new(cache)), clock)
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

// == SET / GET Endpoint Tests ==

#[tokio::test]
async fn test_set_then_get_returns_structured_value() {
    let app = create_test_app();
    let value = json!({"name": "widget", "tags": ["a", "b"], "count": 3});

    let (status, json) = send(&app, "PUT", "/set", Some(json!({"key": "item", "value": value}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["stored"], true);
    assert!(json["message"].as_str().unwrap().contains("item"));

    let (status, json) = send(&app, "GET", "/get/item", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["key"], "item");
    assert_eq!(json["value"], value);
}

#[tokio::test]
async fn test_set_plain_string_value() {
    let app = create_test_app();

    send(&app, "PUT", "/set", Some(json!({"key": "greeting", "value": "hello"}))).await;

    let (_, json) = send(&app, "GET", "/get/greeting", None).await;
    assert_eq!(json["value"], "hello");
}

#[tokio::test]
async fn test_get_missing_key_is_not_found() {
    let app = create_test_app();

    let (status, json) = send(&app, "GET", "/get/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("missing"));
}

#[tokio::test]
async fn test_set_rejects_reserved_key() {
    let app = create_test_app();

    let (status, _) = send(
        &app,
        "PUT",
        "/set",
        Some(json!({"key": "k-cacheexpiration", "value": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_set_rejects_empty_key() {
    let app = create_test_app();

    let (status, _) = send(&app, "PUT", "/set", Some(json!({"key": "", "value": 1}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// == DELETE Endpoint Tests ==

#[tokio::test]
async fn test_delete_is_idempotent() {
    let app = create_test_app();
    send(&app, "PUT", "/set", Some(json!({"key": "doomed", "value": 1}))).await;

    let (status, _) = send(&app, "DELETE", "/del/doomed", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "DELETE", "/del/doomed", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", "/get/doomed", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// == TTL Tests ==

#[tokio::test]
async fn test_ttl_entry_expires() {
    let (app, clock) = create_test_app_with_clock();

    send(
        &app,
        "PUT",
        "/set",
        Some(json!({"key": "brief", "value": "soon gone", "ttl": 0.5})),
    )
    .await;

    clock.advance(0.25);
    let (status, _) = send(&app, "GET", "/get/brief", None).await;
    assert_eq!(status, StatusCode::OK);

    clock.advance(0.25);

    let (status, _) = send(&app, "GET", "/get/brief", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, stats) = send(&app, "GET", "/stats", None).await;
    assert_eq!(stats["expirations"], 1);
    assert_eq!(stats["total_entries"], 0);
}

#[tokio::test]
async fn test_flush_expired_keeps_live_entries() {
    let (app, clock) = create_test_app_with_clock();
    send(
        &app,
        "PUT",
        "/set",
        Some(json!({"key": "brief", "value": 1, "ttl": 0.5})),
    )
    .await;
    send(
        &app,
        "PUT",
        "/set",
        Some(json!({"key": "lasting", "value": 2, "ttl": 60})),
    )
    .await;
    send(&app, "PUT", "/set", Some(json!({"key": "forever", "value": 3}))).await;

    clock.advance(1.0);

    let (status, json) = send(&app, "POST", "/flush-expired", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], 1);

    let (status, _) = send(&app, "GET", "/get/lasting", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", "/get/forever", None).await;
    assert_eq!(status, StatusCode::OK);
}

// == Bucket Tests ==

#[tokio::test]
async fn test_buckets_isolate_keys() {
    let app = create_test_app();

    send(&app, "PUT", "/bucket", Some(json!({"name": "tenant-a"}))).await;
    send(&app, "PUT", "/set", Some(json!({"key": "shared", "value": "a"}))).await;

    send(&app, "PUT", "/bucket", Some(json!({"name": "tenant-b"}))).await;
    let (status, _) = send(&app, "GET", "/get/shared", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    send(&app, "PUT", "/set", Some(json!({"key": "shared", "value": "b"}))).await;

    let (_, json) = send(&app, "POST", "/flush", None).await;
    assert_eq!(json["bucket"], "tenant-b");
    assert_eq!(json["removed"], 1);

    send(&app, "PUT", "/bucket", Some(json!({"name": "tenant-a"}))).await;
    let (_, json) = send(&app, "GET", "/get/shared", None).await;
    assert_eq!(json["value"], "a");
}

#[tokio::test]
async fn test_reset_bucket_returns_to_default() {
    let app = create_test_app();
    send(&app, "PUT", "/set", Some(json!({"key": "root", "value": true}))).await;
    send(&app, "PUT", "/bucket", Some(json!({"name": "elsewhere"}))).await;

    let (status, json) = send(&app, "DELETE", "/bucket", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["bucket"], "");

    let (_, json) = send(&app, "GET", "/get/root", None).await;
    assert_eq!(json["value"], true);
}

// == Init / Supported Tests ==

#[tokio::test]
async fn test_init_selects_session_store() {
    let app = create_test_app();
    send(&app, "PUT", "/set", Some(json!({"key": "durable-only", "value": 1}))).await;

    let (status, json) = send(&app, "POST", "/init", Some(json!({"storageKind": "session"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["supported"], true);
    assert_eq!(json["usingKind"], "session");

    let (status, _) = send(&app, "GET", "/get/durable-only", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_init_unregistered_kind_falls_back_to_durable() {
    let app = create_test_app();

    let (status, json) = send(&app, "POST", "/init", Some(json!({"storageKind": "synced"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["usingKind"], "durable");

    let (_, json) = send(&app, "POST", "/init", Some(json!({"storageKind": "bogus"}))).await;
    assert_eq!(json["usingKind"], "durable");
}

#[tokio::test]
async fn test_init_without_options_reports_nothing() {
    let app = create_test_app();

    let (status, json) = send(&app, "POST", "/init", Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({}));
}

#[tokio::test]
async fn test_init_unknown_option_is_rejected() {
    let app = create_test_app();

    let (status, json) = send(&app, "POST", "/init", Some(json!({"storageType": "session"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("storageType"));
}

#[tokio::test]
async fn test_supported_endpoint() {
    let app = create_test_app();

    let (status, json) = send(&app, "GET", "/supported", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["supported"], true);
}

// == Warnings / Stats / Health ==

#[tokio::test]
async fn test_warnings_toggle() {
    let app = create_test_app();

    let (status, json) = send(&app, "PUT", "/warnings", Some(json!({"enabled": true}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["enabled"], true);
}

#[tokio::test]
async fn test_stats_track_hits_and_misses() {
    let app = create_test_app();
    send(&app, "PUT", "/set", Some(json!({"key": "k", "value": 1}))).await;
    send(&app, "GET", "/get/k", None).await;
    send(&app, "GET", "/get/k", None).await;
    send(&app, "GET", "/get/nope", None).await;

    let (status, json) = send(&app, "GET", "/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["hits"], 2);
    assert_eq!(json["misses"], 1);
    assert_eq!(json["total_entries"], 1);
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();

    let (status, json) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
}

// == Durable File Store ==

#[tokio::test]
async fn test_file_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        data_dir: Some(dir.path().to_path_buf()),
        ..Config::default()
    };

    let app = create_router(AppState::from_config(&config).unwrap());
    send(&app, "PUT", "/set", Some(json!({"key": "kept", "value": [1, 2, 3]}))).await;
    drop(app);

    let app = create_router(AppState::from_config(&config).unwrap());
    let (status, json) = send(&app, "GET", "/get/kept", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["value"], json!([1, 2, 3]));
}
