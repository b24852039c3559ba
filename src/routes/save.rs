//! `POST /save_memory` and `POST /save_reflection`.

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;
use crate::memory::sanitize;
use crate::memory::slide_id::{allocate_slide_id, is_valid_slide_id};
use crate::memory::types::{MemoryRecord, RecordKind, Seal};
use crate::routes::{optional_text, parse_json_object, required_text};
use crate::server::AppState;

/// Raw save payload. Fields stay untyped until validation so that wrong types
/// produce a field-specific `400` instead of a generic parse error. Any `ts`
/// sent by the client is ignored.
#[derive(Debug, Default, Deserialize)]
pub struct SaveRecordParams {
    pub user_id: Option<Value>,
    pub content: Option<Value>,
    pub thread_id: Option<Value>,
    /// Used verbatim only when it has the `t-NNN`/`r-NNN` shape.
    pub slide_id: Option<Value>,
    pub glyph_echo: Option<Value>,
    /// Number or numeric string; clamped to `[0.0, 0.30]`.
    pub drift_score: Option<Value>,
    pub seal: Option<Value>,
    pub role: Option<Value>,
    /// Reflections only.
    pub checksum_kappa: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub ok: bool,
    pub status: &'static str,
    pub slide_id: String,
    pub ts: i64,
}

/// A validated, sanitized save request still missing its slide id and timestamp.
#[derive(Debug)]
struct RecordDraft {
    user_id: String,
    thread_id: String,
    client_slide_id: Option<String>,
    glyph_echo: String,
    drift_score: f64,
    seal: Seal,
    role: String,
    content: String,
    checksum_kappa: Option<String>,
}

impl RecordDraft {
    fn from_params(
        params: SaveRecordParams,
        kind: RecordKind,
        max_content_chars: usize,
    ) -> Result<Self, ApiError> {
        let user_id = required_text("user_id", params.user_id)?;
        let content = required_text("content", params.content)?;
        if !sanitize::content_within_limit(&content, max_content_chars) {
            return Err(ApiError::ContentTooLarge {
                max: max_content_chars,
            });
        }

        let thread_id = optional_text("thread_id", params.thread_id)?;
        let slide_id = optional_text("slide_id", params.slide_id)?;
        let glyph = optional_text("glyph_echo", params.glyph_echo)?;
        let seal = optional_text("seal", params.seal)?;
        let role = optional_text("role", params.role)?;
        let checksum = match kind {
            RecordKind::Reflection => optional_text("checksum_kappa", params.checksum_kappa)?,
            RecordKind::Memory => None,
        };

        Ok(Self {
            user_id: user_id.trim().to_string(),
            thread_id: sanitize::sanitize_thread(thread_id.as_deref()),
            client_slide_id: slide_id
                .map(|s| s.trim().to_string())
                .filter(|s| is_valid_slide_id(s)),
            glyph_echo: sanitize::sanitize_glyph(glyph.as_deref()),
            drift_score: sanitize::clamp_drift(params.drift_score.as_ref()),
            seal: sanitize::sanitize_seal(seal.as_deref()),
            role: sanitize::sanitize_role(role.as_deref()),
            content,
            checksum_kappa: sanitize::sanitize_checksum(checksum.as_deref()),
        })
    }
}

pub async fn save_memory(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<SaveResponse>), ApiError> {
    save_record(&state, RecordKind::Memory, &body?).await
}

pub async fn save_reflection(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<SaveResponse>), ApiError> {
    save_record(&state, RecordKind::Reflection, &body?).await
}

async fn save_record(
    state: &AppState,
    kind: RecordKind,
    body: &[u8],
) -> Result<(StatusCode, Json<SaveResponse>), ApiError> {
    let params: SaveRecordParams = parse_json_object(body)?;
    let draft = RecordDraft::from_params(params, kind, state.limits.max_content_chars)?;

    let slide_id = match draft.client_slide_id {
        Some(slide_id) => slide_id,
        None => {
            allocate_slide_id(state.store.as_ref(), kind, &draft.user_id, &draft.thread_id)
                .await?
        }
    };

    let record = MemoryRecord {
        user_id: draft.user_id,
        thread_id: draft.thread_id,
        slide_id,
        glyph_echo: draft.glyph_echo,
        drift_score: draft.drift_score,
        seal: draft.seal,
        role: draft.role,
        content: draft.content,
        checksum_kappa: draft.checksum_kappa,
        ts: state.clock.now(),
    };

    let stored = state.store.insert(kind, &record).await?;
    tracing::info!(
        kind = %kind,
        user_id = %record.user_id,
        thread_id = %record.thread_id,
        slide_id = %stored,
        content_len = record.content.len(),
        "record saved"
    );

    Ok((
        StatusCode::CREATED,
        Json(SaveResponse {
            ok: true,
            status: "saved",
            slide_id: stored,
            ts: record.ts,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> SaveRecordParams {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn draft_applies_defaults() {
        let draft = RecordDraft::from_params(
            params(json!({"user_id": " u1 ", "content": "hello"})),
            RecordKind::Memory,
            100,
        )
        .unwrap();
        assert_eq!(draft.user_id, "u1");
        assert_eq!(draft.thread_id, "general");
        assert_eq!(draft.role, "assistant");
        assert_eq!(draft.seal, Seal::Lawful);
        assert_eq!(draft.glyph_echo, sanitize::DEFAULT_GLYPH);
        assert_eq!(draft.drift_score, sanitize::DRIFT_DEFAULT);
        assert!(draft.client_slide_id.is_none());
    }

    #[test]
    fn draft_keeps_valid_client_slide_id_only() {
        let keep = RecordDraft::from_params(
            params(json!({"user_id": "u1", "content": "x", "slide_id": "t-077"})),
            RecordKind::Memory,
            100,
        )
        .unwrap();
        assert_eq!(keep.client_slide_id.as_deref(), Some("t-077"));

        let drop = RecordDraft::from_params(
            params(json!({"user_id": "u1", "content": "x", "slide_id": "slide seven"})),
            RecordKind::Memory,
            100,
        )
        .unwrap();
        assert!(drop.client_slide_id.is_none());
    }

    #[test]
    fn draft_rejects_missing_and_oversize() {
        let missing = RecordDraft::from_params(
            params(json!({"content": "x"})),
            RecordKind::Memory,
            100,
        );
        assert!(matches!(missing, Err(ApiError::BadRequest(_))));

        let oversize = RecordDraft::from_params(
            params(json!({"user_id": "u1", "content": "abcd"})),
            RecordKind::Memory,
            3,
        );
        assert!(matches!(oversize, Err(ApiError::ContentTooLarge { max: 3 })));
    }

    #[test]
    fn checksum_only_kept_for_reflections() {
        let body = json!({"user_id": "u1", "content": "x", "checksum_kappa": "k"});
        let memory =
            RecordDraft::from_params(params(body.clone()), RecordKind::Memory, 100).unwrap();
        assert!(memory.checksum_kappa.is_none());
        let reflection =
            RecordDraft::from_params(params(body), RecordKind::Reflection, 100).unwrap();
        assert_eq!(reflection.checksum_kappa.as_deref(), Some("k"));
    }
}
