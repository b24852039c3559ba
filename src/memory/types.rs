//! Core record type definitions.
//!
//! Defines [`RecordKind`] (memories vs. reflections), [`Seal`] (the enumerated
//! priority tag), [`MemoryRecord`] (one stored row), and the query shapes the
//! storage backends accept.

use serde::{Deserialize, Serialize};

/// The two record families. Each kind lives in its own table and uses its own
/// auto-generated slide id prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Conversational memory entries (`memories`, `t-NNN`).
    Memory,
    /// Reflection entries carrying a `checksum_kappa` (`reflections`, `r-NNN`).
    Reflection,
}

impl RecordKind {
    /// Name of the backing table.
    pub fn table(&self) -> &'static str {
        match self {
            Self::Memory => "memories",
            Self::Reflection => "reflections",
        }
    }

    /// Prefix used for allocator-generated slide ids.
    pub fn slide_prefix(&self) -> char {
        match self {
            Self::Memory => 't',
            Self::Reflection => 'r',
        }
    }

    /// Whether rows of this kind carry a `checksum_kappa` column.
    pub fn has_checksum(&self) -> bool {
        matches!(self, Self::Reflection)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Reflection => "reflection",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trust/priority tag attached to every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seal {
    Ok,
    Important,
    Critical,
    /// Fallback for missing or unrecognized values.
    #[default]
    Lawful,
}

impl Seal {
    pub const ALL: [Seal; 4] = [Seal::Ok, Seal::Important, Seal::Critical, Seal::Lawful];

    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Important => "important",
            Self::Critical => "critical",
            Self::Lawful => "lawful",
        }
    }

    /// Lenient conversion used when reading rows back: anything unknown is `Lawful`.
    pub fn from_stored(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl std::fmt::Display for Seal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Seal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(Self::Ok),
            "important" => Ok(Self::Important),
            "critical" => Ok(Self::Critical),
            "lawful" => Ok(Self::Lawful),
            _ => Err(format!("unknown seal: {s}")),
        }
    }
}

/// One stored conversational entry, matching the `memories`/`reflections` schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Owner of the record.
    pub user_id: String,
    /// Conversation scope, `"general"` when the client sends none.
    pub thread_id: String,
    /// Advisory per-(user, thread) identifier such as `t-042`.
    pub slide_id: String,
    /// Short symbolic marker, at most 16 characters.
    pub glyph_echo: String,
    /// Bounded metric in `[0.0, 0.30]`.
    pub drift_score: f64,
    pub seal: Seal,
    /// Speaker role, at most 32 characters.
    pub role: String,
    pub content: String,
    /// Only present on reflections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum_kappa: Option<String>,
    /// Unix epoch seconds assigned by the server at insert time.
    pub ts: i64,
}

/// The most recent `(slide_id, ts)` pair in a `(user_id, thread_id)` group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestSlide {
    pub slide_id: String,
    pub ts: i64,
}

/// Equality filters for [`RecordQuery`]. `None` or blank values match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilters {
    pub user_id: Option<String>,
    pub thread_id: Option<String>,
    pub slide_id: Option<String>,
    pub seal: Option<String>,
    pub role: Option<String>,
}

impl RecordFilters {
    /// Filters that actually participate, as `(column, value)` pairs in a fixed order.
    pub fn active(&self) -> Vec<(&'static str, &str)> {
        [
            ("user_id", &self.user_id),
            ("thread_id", &self.thread_id),
            ("slide_id", &self.slide_id),
            ("seal", &self.seal),
            ("role", &self.role),
        ]
        .into_iter()
        .filter_map(|(column, value)| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| (column, v))
        })
        .collect()
    }
}

/// A filtered, cursor-paginated read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    pub filters: RecordFilters,
    /// Maximum number of rows returned.
    pub limit: u32,
    /// Only rows with `ts < before_ts` are returned.
    pub before_ts: Option<i64>,
}

impl RecordQuery {
    pub fn new(filters: RecordFilters, limit: u32) -> Self {
        Self {
            filters,
            limit,
            before_ts: None,
        }
    }

    pub fn before(mut self, before_ts: i64) -> Self {
        self.before_ts = Some(before_ts);
        self
    }
}
