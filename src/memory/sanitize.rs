//! Field normalization applied on the write path.
//!
//! Every function here is pure: it maps an arbitrary client value onto the
//! bounded domain the store accepts. Content length is the one check that
//! rejects instead of normalizing, see [`content_within_limit`].

use serde_json::Value;

use crate::memory::types::Seal;

/// Lower bound for `drift_score`.
pub const DRIFT_MIN: f64 = 0.0;
/// Upper bound for `drift_score`.
pub const DRIFT_MAX: f64 = 0.30;
/// Used when `drift_score` is missing or does not parse.
pub const DRIFT_DEFAULT: f64 = 0.10;

/// Glyph stored when the client sends none.
pub const DEFAULT_GLYPH: &str = "⟁";
pub const GLYPH_MAX_CHARS: usize = 16;

pub const DEFAULT_ROLE: &str = "assistant";
pub const ROLE_MAX_CHARS: usize = 32;

pub const CHECKSUM_MAX_CHARS: usize = 64;

pub const DEFAULT_THREAD: &str = "general";

/// Parse a drift score from any JSON value and clamp it to `[0.0, 0.30]`.
///
/// Numbers are used directly, strings are parsed after trimming, and anything
/// else (including NaN) falls back to [`DRIFT_DEFAULT`].
pub fn clamp_drift(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|v| !v.is_nan())
        .unwrap_or(DRIFT_DEFAULT)
        .clamp(DRIFT_MIN, DRIFT_MAX)
}

/// Trim, default to [`DEFAULT_GLYPH`], and cap at 16 characters.
pub fn sanitize_glyph(value: Option<&str>) -> String {
    non_blank(value)
        .map(|g| truncate_chars(g, GLYPH_MAX_CHARS))
        .unwrap_or_else(|| DEFAULT_GLYPH.to_string())
}

/// Lower-case and trim; unknown values become [`Seal::Lawful`].
pub fn sanitize_seal(value: Option<&str>) -> Seal {
    value
        .map(|s| s.trim().to_lowercase())
        .and_then(|s| s.parse().ok())
        .unwrap_or_default()
}

/// Trim, default to `assistant`, and cap at 32 characters.
pub fn sanitize_role(value: Option<&str>) -> String {
    non_blank(value)
        .map(|r| truncate_chars(r, ROLE_MAX_CHARS))
        .unwrap_or_else(|| DEFAULT_ROLE.to_string())
}

/// Trim and default to `general`.
pub fn sanitize_thread(value: Option<&str>) -> String {
    non_blank(value)
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_THREAD.to_string())
}

/// Trim and cap at 64 characters; blank values are dropped.
pub fn sanitize_checksum(value: Option<&str>) -> Option<String> {
    non_blank(value).map(|c| truncate_chars(c, CHECKSUM_MAX_CHARS))
}

/// `true` when `content` has at most `max_chars` characters.
pub fn content_within_limit(content: &str, max_chars: usize) -> bool {
    content.chars().nth(max_chars).is_none()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
