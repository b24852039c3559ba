//! Per-client fixed-window rate limiting.
//!
//! Each client key gets a counter and a window start. When the window has
//! elapsed the counter resets. State lives in this process only; several
//! server instances each enforce their own limit.

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::config::SecurityConfig;
use crate::error::ApiError;
use crate::server::AppState;

/// Above this many tracked clients, expired windows are dropped on the next check.
const PRUNE_THRESHOLD: usize = 10_000;

/// Outcome of a single [`RateLimiter::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: usize },
    Limited { retry_after: Duration },
}

#[derive(Debug, Clone, Copy)]
struct ClientWindow {
    request_count: usize,
    window_start: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    clients: Mutex<HashMap<String, ClientWindow>>,
}

impl RateLimiter {
    /// `max_requests == 0` disables limiting.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &SecurityConfig) -> Self {
        Self::new(
            config.rate_limit_max_requests,
            Duration::from_secs(config.rate_limit_window_secs),
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.max_requests > 0
    }

    pub fn check(&self, client: &str) -> RateDecision {
        self.check_at(client, Instant::now())
    }

    /// Count one request from `client` at `now`.
    pub fn check_at(&self, client: &str, now: Instant) -> RateDecision {
        if !self.is_enabled() {
            return RateDecision::Allowed {
                remaining: usize::MAX,
            };
        }

        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        if clients.len() > PRUNE_THRESHOLD {
            let window = self.window;
            clients.retain(|_, w| now.saturating_duration_since(w.window_start) < window);
        }

        let entry = clients.entry(client.to_string()).or_insert(ClientWindow {
            request_count: 0,
            window_start: now,
        });

        let elapsed = now.saturating_duration_since(entry.window_start);
        if elapsed >= self.window {
            entry.request_count = 0;
            entry.window_start = now;
        }

        if entry.request_count >= self.max_requests {
            let retry_after = self
                .window
                .saturating_sub(now.saturating_duration_since(entry.window_start));
            return RateDecision::Limited { retry_after };
        }

        entry.request_count += 1;
        RateDecision::Allowed {
            remaining: self.max_requests - entry.request_count,
        }
    }
}

/// Identify the caller: first `X-Forwarded-For` hop when trusted, else the peer address.
fn client_key(request: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware answering `429` once a client exceeds its window.
pub async fn enforce_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let client = client_key(&request, state.trust_forwarded_for);
    match state.limiter.check(&client) {
        RateDecision::Allowed { .. } => Ok(next.run(request).await),
        RateDecision::Limited { retry_after } => {
            tracing::warn!(
                client = %client,
                path = %request.uri().path(),
                "rate limit exceeded"
            );
            Err(ApiError::RateLimited {
                retry_after_secs: retry_after.as_secs().max(1),
            })
        }
    }
}
