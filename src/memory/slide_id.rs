//! Sequential slide id allocation.
//!
//! Ids look like `t-001`, `t-042`, `r-1000`: a kind prefix, a dash, and a
//! zero-padded counter of 3 to 6 digits. The next id in a `(user_id, thread_id)`
//! group is derived from the newest stored one.
//!
//! Allocation is read-then-format with no lock: two concurrent saves in the same
//! group can observe the same latest row and produce the same id. Slide ids are
//! advisory and nothing keys on them.

use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;

use crate::memory::store::MemoryStore;
use crate::memory::types::RecordKind;

static SLIDE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[tr]-(\d{3,6})$").expect("valid slide id regex"));

const MIN_WIDTH: usize = 3;
const MAX_COUNTER: u32 = 999_999;

/// `true` if `candidate` has the auto-generated slide id shape.
pub fn is_valid_slide_id(candidate: &str) -> bool {
    SLIDE_ID_RE.is_match(candidate)
}

/// The id that follows `previous` for records of `kind`.
///
/// Starts at `001` when there is no previous id or it is not in the expected
/// shape. The counter keeps the previous id's padding width and saturates at
/// `999999`.
pub fn next_slide_id(kind: RecordKind, previous: Option<&str>) -> String {
    let prefix = kind.slide_prefix();
    let parsed = previous
        .and_then(|p| SLIDE_ID_RE.captures(p))
        .and_then(|caps| {
            let digits = caps.get(1)?.as_str();
            digits.parse::<u32>().ok().map(|n| (n, digits.len()))
        });

    match parsed {
        Some((n, width)) => {
            let next = n.saturating_add(1).min(MAX_COUNTER);
            format!("{prefix}-{next:0width$}")
        }
        None => format!("{prefix}-{:0MIN_WIDTH$}", 1),
    }
}

/// Derive the next slide id for a group from the store's newest record.
pub async fn allocate_slide_id(
    store: &dyn MemoryStore,
    kind: RecordKind,
    user_id: &str,
    thread_id: &str,
) -> Result<String> {
    let latest = store
        .select_latest_in_group(kind, user_id, thread_id)
        .await?;
    let next = next_slide_id(kind, latest.as_ref().map(|l| l.slide_id.as_str()));
    tracing::debug!(
        user_id,
        thread_id,
        previous = latest.as_ref().map(|l| l.slide_id.as_str()),
        next = %next,
        "allocated slide id"
    );
    Ok(next)
}
