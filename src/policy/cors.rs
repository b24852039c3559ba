//! Origin allow-list.

use axum::http::{header, HeaderName, HeaderValue, Method};
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::policy::auth::API_KEY_HEADER;

const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(600);

/// CORS layer for the configured origins.
///
/// `"*"` (or an empty list) allows any origin. Otherwise only listed origins
/// are echoed back in `Access-Control-Allow-Origin`, with `Vary: Origin` set
/// on every response.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(API_KEY_HEADER),
        ])
        .max_age(PREFLIGHT_MAX_AGE);

    let wildcard = allowed_origins.is_empty() || allowed_origins.iter().any(|o| o.trim() == "*");
    if wildcard {
        return base.allow_origin(AllowOrigin::any());
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| {
            let origin = origin.trim().trim_end_matches('/');
            match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin, "ignoring invalid CORS origin");
                    None
                }
            }
        })
        .collect();

    base.allow_origin(AllowOrigin::list(origins))
}
