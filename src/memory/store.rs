//! The storage capability every backend implements.
//!
//! Handlers only ever see an `Arc<dyn MemoryStore>`; which engine sits behind
//! it is decided once by [`crate::db::open_store`].

use anyhow::Result;
use async_trait::async_trait;

use crate::memory::types::{LatestSlide, MemoryRecord, RecordKind, RecordQuery};

/// Which engine a store is running on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    /// Embedded single-file database.
    Sqlite,
    /// Pooled network database.
    Postgres,
}

impl Engine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
        }
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform record store over both engines.
///
/// Every call either commits/reads fully or returns an error; there is no
/// retry inside the store.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    fn engine(&self) -> Engine;

    /// Human-readable location (file path or redacted host) for logs.
    fn location(&self) -> String;

    /// Append one row and return the `slide_id` that was stored.
    async fn insert(&self, kind: RecordKind, record: &MemoryRecord) -> Result<String>;

    /// Rows matching every active filter, newest first, at most `query.limit`.
    async fn select(&self, kind: RecordKind, query: &RecordQuery) -> Result<Vec<MemoryRecord>>;

    /// The newest record for exactly this `(user_id, thread_id)` pair.
    async fn select_latest_in_group(
        &self,
        kind: RecordKind,
        user_id: &str,
        thread_id: &str,
    ) -> Result<Option<LatestSlide>>;
}
