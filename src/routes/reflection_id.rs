//! `POST /reflection_id`.

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;
use crate::memory::reflection_id::reflection_id_for_email;
use crate::routes::{optional_text, parse_json_object};

#[derive(Debug, Default, Deserialize)]
pub struct ReflectionIdParams {
    pub email: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ReflectionIdResponse {
    pub ok: bool,
    pub reflection_id: String,
}

pub async fn reflection_id(
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<ReflectionIdResponse>, ApiError> {
    let body = body?;
    let params: ReflectionIdParams = parse_json_object(&body)?;
    let email = optional_text("email", params.email)?.unwrap_or_default();

    let reflection_id = reflection_id_for_email(email.trim())
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(Json(ReflectionIdResponse {
        ok: true,
        reflection_id,
    }))
}
