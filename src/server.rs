//! HTTP server wiring.
//!
//! [`AppState`] holds the injected collaborators (store, auth, limiter, clock),
//! [`build_router`] attaches routes and policy layers, and [`serve`] binds the
//! listener with graceful shutdown.

use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::{LimitsConfig, MemoryApiConfig};
use crate::db;
use crate::error::panic_response;
use crate::memory::clock::InsertClock;
use crate::memory::store::MemoryStore;
use crate::policy::auth::{require_api_key, ApiKeyAuth};
use crate::policy::cors::cors_layer;
use crate::policy::rate_limit::{enforce_rate_limit, RateLimiter};
use crate::routes;

/// Minimum request body limit; raised when content limits need more room.
const MIN_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Shared request state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MemoryStore>,
    pub auth: Arc<ApiKeyAuth>,
    pub limiter: Arc<RateLimiter>,
    pub clock: Arc<InsertClock>,
    pub limits: LimitsConfig,
    pub trust_forwarded_for: bool,
}

impl AppState {
    pub fn new(store: Arc<dyn MemoryStore>, config: &MemoryApiConfig) -> Self {
        Self {
            store,
            auth: Arc::new(ApiKeyAuth::new(config.security.api_key.clone())),
            limiter: Arc::new(RateLimiter::from_config(&config.security)),
            clock: Arc::new(InsertClock::new()),
            limits: config.limits.clone(),
            trust_forwarded_for: config.security.trust_forwarded_for,
        }
    }
}

/// Routes plus policy layers.
///
/// Protected routes pass API key auth first, then the rate limiter. CORS sits
/// outermost so preflight requests never need a key.
pub fn build_router(state: AppState, config: &MemoryApiConfig) -> Router {
    // 4 bytes per char worst case, plus room for the other fields
    let body_limit = (config.limits.max_content_chars * 4 + 64 * 1024).max(MIN_BODY_LIMIT);

    let protected = Router::new()
        .route("/save_memory", post(routes::save::save_memory))
        .route("/get_memory", get(routes::fetch::get_memory))
        .route("/save_reflection", post(routes::save::save_reflection))
        .route("/get_reflections", get(routes::fetch::get_reflections))
        .route("/reflection_id", post(routes::reflection_id::reflection_id))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            enforce_rate_limit,
        ))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    Router::new()
        .route("/", get(routes::health::index))
        .route("/health", get(routes::health::health))
        .merge(protected)
        .fallback(routes::health::not_found)
        .method_not_allowed_fallback(routes::health::method_not_allowed)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.security.allowed_origins))
        .with_state(state)
}

/// Select the storage backend, then serve HTTP until ctrl-c.
pub async fn serve(config: MemoryApiConfig) -> Result<()> {
    let store = db::open_store(&config.storage).await?;
    tracing::info!(
        backend = %store.engine(),
        location = %store.location(),
        "storage backend selected"
    );

    let state = AppState::new(store, &config);
    if !state.auth.is_configured() {
        tracing::warn!("no api key configured, protected endpoints will reject every request");
    }
    if !state.limiter.is_enabled() {
        tracing::info!("rate limiting disabled");
    }

    let app = build_router(state, &config);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "memory api listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        tracing::info!("shutting down");
    })
    .await?;

    Ok(())
}
