//! Unauthenticated service endpoints and the JSON fallbacks.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::server::AppState;

const ENDPOINTS: [&str; 7] = [
    "GET /",
    "GET /health",
    "POST /save_memory",
    "GET /get_memory",
    "POST /save_reflection",
    "GET /get_reflections",
    "POST /reflection_id",
];

pub async fn index(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "ok": true,
        "service": "memory-api",
        "version": env!("CARGO_PKG_VERSION"),
        "backend": state.store.engine().as_str(),
        "endpoints": ENDPOINTS,
    }))
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "ok": true,
        "ts": chrono::Utc::now().timestamp(),
        "backend": state.store.engine().as_str(),
    }))
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
