//! HTTP-facing error type.
//!
//! Every failure leaves the service as `{ "ok": false, "error": ..., "code": ... }`
//! with `code` equal to the HTTP status.

use axum::extract::rejection::{BytesRejection, QueryRejection};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::any::Any;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("content exceeds maximum length of {max} characters")]
    ContentTooLarge { max: usize },

    #[error("request body too large")]
    BodyTooLarge,

    #[error("unauthorized")]
    Unauthorized,

    #[error("rate limit exceeded, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("not found")]
    NotFound,

    #[error("method not allowed")]
    MethodNotAllowed,

    /// Engine failure. Detail is logged, never sent to the client.
    #[error("storage failure")]
    Storage(anyhow::Error),

    #[error("internal server error")]
    Internal,
}

impl ApiError {
    pub fn missing_field(field: &str) -> Self {
        Self::BadRequest(format!("missing required field: {field}"))
    }

    pub fn invalid_field(field: &str, reason: &str) -> Self {
        Self::BadRequest(format!("invalid field {field}: {reason}"))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::ContentTooLarge { .. } | Self::BodyTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Storage(_) | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Storage(err)
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::BodyTooLarge
        } else {
            Self::BadRequest(rejection.body_text())
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let Self::Storage(err) = &self {
            tracing::error!(error = %format!("{err:#}"), "storage operation failed");
        }

        let body = Json(serde_json::json!({
            "ok": false,
            "error": self.to_string(),
            "code": status.as_u16(),
        }));

        let mut response = (status, body).into_response();
        if let Self::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

/// Panic handler for `CatchPanicLayer`: a panicking handler still answers JSON.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(detail, "request handler panicked");
    ApiError::Internal.into_response()
}
