//! Shared-secret API key check.
//!
//! Clients present the key either as `X-API-KEY: <key>` or as
//! `Authorization: Bearer <key>`. Header names are matched case-insensitively.

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::ApiError;
use crate::server::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// The single server-configured secret.
#[derive(Clone)]
pub struct ApiKeyAuth {
    key: String,
}

impl std::fmt::Debug for ApiKeyAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyAuth")
            .field("configured", &self.is_configured())
            .finish()
    }
}

impl ApiKeyAuth {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// An empty key means every protected request is rejected.
    pub fn is_configured(&self) -> bool {
        !self.key.is_empty()
    }

    /// `true` when the request presents the configured key.
    pub fn verify(&self, headers: &HeaderMap) -> bool {
        if !self.is_configured() {
            return false;
        }
        match presented_key(headers) {
            Some(candidate) => constant_time_eq(candidate.as_bytes(), self.key.as_bytes()),
            None => false,
        }
    }
}

/// The key a request presents, preferring `X-API-KEY` over a bearer token.
pub fn presented_key(headers: &HeaderMap) -> Option<&str> {
    let from_header = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if from_header.is_some() {
        return from_header;
    }

    let auth = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = auth.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|t| !t.is_empty())
}

/// Constant-time comparison to avoid leaking the key through timing.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Middleware rejecting requests without a valid key before any handler runs.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.auth.verify(request.headers()) {
        tracing::warn!(
            path = %request.uri().path(),
            presented = presented_key(request.headers()).is_some(),
            "rejected request without valid api key"
        );
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(request).await)
}
