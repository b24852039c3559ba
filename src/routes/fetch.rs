//! `GET /get_memory` and `GET /get_reflections`.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::Serialize;
use std::collections::HashMap;

use crate::config::LimitsConfig;
use crate::error::ApiError;
use crate::memory::types::{MemoryRecord, RecordFilters, RecordKind, RecordQuery};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub ok: bool,
    pub items: Vec<MemoryRecord>,
    pub count: usize,
    /// `ts` of the oldest returned item; pass back as `before_ts` for the next page.
    pub next_before_ts: Option<i64>,
}

pub async fn get_memory(
    State(state): State<AppState>,
    params: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Result<Json<ListResponse>, ApiError> {
    let Query(params) = params?;
    list_records(&state, RecordKind::Memory, &params).await
}

pub async fn get_reflections(
    State(state): State<AppState>,
    params: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Result<Json<ListResponse>, ApiError> {
    let Query(params) = params?;
    list_records(&state, RecordKind::Reflection, &params).await
}

async fn list_records(
    state: &AppState,
    kind: RecordKind,
    params: &HashMap<String, String>,
) -> Result<Json<ListResponse>, ApiError> {
    let query = parse_list_query(params, &state.limits)?;
    let items = state.store.select(kind, &query).await?;
    tracing::debug!(
        kind = %kind,
        limit = query.limit,
        before_ts = ?query.before_ts,
        returned = items.len(),
        "records listed"
    );

    let next_before_ts = items.last().map(|r| r.ts);
    Ok(Json(ListResponse {
        ok: true,
        count: items.len(),
        items,
        next_before_ts,
    }))
}

/// Build a [`RecordQuery`] from raw query parameters.
///
/// Blank `limit` means the configured default; a non-integer `limit` or
/// `before_ts` is a `400`. Integer limits are clamped to `[1, max_limit]`.
pub fn parse_list_query(
    params: &HashMap<String, String>,
    limits: &LimitsConfig,
) -> Result<RecordQuery, ApiError> {
    let filter = |name: &str| params.get(name).map(|v| v.trim().to_string());
    let filters = RecordFilters {
        user_id: filter("user_id"),
        thread_id: filter("thread_id"),
        slide_id: filter("slide_id"),
        seal: filter("seal"),
        role: filter("role"),
    };

    let limit = match non_blank(params, "limit") {
        None => limits.default_limit,
        Some(raw) => {
            let requested: i64 = raw
                .parse()
                .map_err(|_| ApiError::invalid_field("limit", "expected an integer"))?;
            clamp_limit(requested, limits.max_limit)
        }
    };

    let mut query = RecordQuery::new(filters, limit);
    if let Some(raw) = non_blank(params, "before_ts") {
        let before_ts: i64 = raw
            .parse()
            .map_err(|_| ApiError::invalid_field("before_ts", "expected an integer"))?;
        query = query.before(before_ts);
    }
    Ok(query)
}

fn non_blank<'a>(params: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    params
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn clamp_limit(requested: i64, max_limit: u32) -> u32 {
    let max = i64::from(max_limit.max(1));
    // in range after clamp
    requested.clamp(1, max) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn limit_defaults_and_clamps() {
        let limits = LimitsConfig::default();
        assert_eq!(parse_list_query(&params(&[]), &limits).unwrap().limit, 50);
        assert_eq!(
            parse_list_query(&params(&[("limit", " ")]), &limits).unwrap().limit,
            50
        );
        assert_eq!(
            parse_list_query(&params(&[("limit", "0")]), &limits).unwrap().limit,
            1
        );
        assert_eq!(
            parse_list_query(&params(&[("limit", "-5")]), &limits).unwrap().limit,
            1
        );
        assert_eq!(
            parse_list_query(&params(&[("limit", "5000")]), &limits).unwrap().limit,
            200
        );
        assert_eq!(
            parse_list_query(&params(&[("limit", "7")]), &limits).unwrap().limit,
            7
        );
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let limits = LimitsConfig::default();
        assert!(matches!(
            parse_list_query(&params(&[("limit", "ten")]), &limits),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            parse_list_query(&params(&[("before_ts", "yesterday")]), &limits),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn filters_and_cursor_are_collected() {
        let query = parse_list_query(
            &params(&[
                ("user_id", " u1 "),
                ("thread_id", ""),
                ("before_ts", "1700000000"),
            ]),
            &LimitsConfig::default(),
        )
        .unwrap();
        assert_eq!(query.before_ts, Some(1_700_000_000));
        assert_eq!(query.filters.active(), vec![("user_id", "u1")]);
    }
}
