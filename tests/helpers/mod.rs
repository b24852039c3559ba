#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use memory_api::config::MemoryApiConfig;
use memory_api::db::sqlite::SqliteStore;
use memory_api::memory::types::{MemoryRecord, Seal};
use memory_api::server::{build_router, AppState};
use serde_json::Value;
use std::sync::Arc;

pub const TEST_KEY: &str = "test-key";

/// Default config with a known API key and the rate limiter out of the way.
pub fn test_config() -> MemoryApiConfig {
    let mut config = MemoryApiConfig::default();
    config.security.api_key = TEST_KEY.to_string();
    config.security.rate_limit_max_requests = 0;
    config
}

/// Fresh in-memory SQLite store with the schema applied.
pub fn test_store() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::open_in_memory().unwrap())
}

/// Router over `store`, configured by `config`.
pub fn test_app_with(store: Arc<SqliteStore>, config: &MemoryApiConfig) -> Router {
    let state = AppState::new(store, config);
    build_router(state, config)
}

/// Router over a fresh store with [`test_config`]. Returns the store for direct inspection.
pub fn test_app() -> (Router, Arc<SqliteStore>) {
    let store = test_store();
    let app = test_app_with(store.clone(), &test_config());
    (app, store)
}

/// A record with sane defaults; callers override what they test.
pub fn record(user_id: &str, thread_id: &str, slide_id: &str, ts: i64) -> MemoryRecord {
    MemoryRecord {
        user_id: user_id.to_string(),
        thread_id: thread_id.to_string(),
        slide_id: slide_id.to_string(),
        glyph_echo: "⟁".to_string(),
        drift_score: 0.1,
        seal: Seal::Lawful,
        role: "assistant".to_string(),
        content: format!("content at {ts}"),
        checksum_kappa: None,
        ts,
    }
}

/// Authorized JSON POST.
pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-api-key", TEST_KEY)
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Authorized GET.
pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("x-api-key", TEST_KEY)
        .body(Body::empty())
        .unwrap()
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
