//! Embedded single-file backend.
//!
//! One `rusqlite::Connection` behind a mutex, in WAL mode with a bounded busy
//! timeout. Queries run on the blocking pool so the async request path never
//! holds the runtime while SQLite works.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rusqlite::types::ToSqlOutput;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row, ToSql};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::db::query::{self, Dialect, SqlValue};
use crate::db::schema;
use crate::memory::store::{Engine, MemoryStore};
use crate::memory::types::{LatestSlide, MemoryRecord, RecordKind, RecordQuery, Seal};

/// Path value that opens a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            SqlValue::Text(s) => s.to_sql(),
            SqlValue::Int(i) => i.to_sql(),
            SqlValue::Real(f) => f.to_sql(),
            SqlValue::OptionalText(o) => o.to_sql(),
        }
    }
}

/// Open (or create) the database file at `path` with WAL and busy timeout set
/// and the schema initialized.
pub fn open_connection(path: &Path, busy_timeout: Duration) -> Result<Connection> {
    let conn = if path.as_os_str() == IN_MEMORY {
        Connection::open_in_memory().context("failed to open in-memory database")?
    } else {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        // WAL lets readers proceed while a writer holds the lock
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn
    };

    conn.busy_timeout(busy_timeout)?;
    schema::init_sqlite_schema(&conn).context("failed to initialize schema")?;
    Ok(conn)
}

/// Append one record. Returns the stored slide id.
pub fn insert_record(conn: &Connection, kind: RecordKind, record: &MemoryRecord) -> Result<String> {
    let sql = query::insert_sql(kind, Dialect::Sqlite);
    let params = query::insert_params(kind, record);
    conn.execute(&sql, params_from_iter(params.iter()))
        .with_context(|| format!("failed to insert into {}", kind.table()))?;
    Ok(record.slide_id.clone())
}

/// Filtered, newest-first read.
pub fn select_records(
    conn: &Connection,
    kind: RecordKind,
    query: &RecordQuery,
) -> Result<Vec<MemoryRecord>> {
    let stmt = query::select_statement(kind, query, Dialect::Sqlite);
    let mut prepared = conn.prepare_cached(&stmt.sql)?;
    let rows = prepared
        .query_map(params_from_iter(stmt.params.iter()), |row| record_from_row(row, kind))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("failed to read from {}", kind.table()))?;
    Ok(rows)
}

/// Newest `(slide_id, ts)` in a `(user_id, thread_id)` group.
pub fn latest_in_group(
    conn: &Connection,
    kind: RecordKind,
    user_id: &str,
    thread_id: &str,
) -> Result<Option<LatestSlide>> {
    let sql = query::latest_in_group_sql(kind, Dialect::Sqlite);
    let latest = conn
        .query_row(&sql, [user_id, thread_id], |row| {
            Ok(LatestSlide {
                slide_id: row.get(0)?,
                ts: row.get(1)?,
            })
        })
        .optional()?;
    Ok(latest)
}

fn record_from_row(row: &Row<'_>, kind: RecordKind) -> rusqlite::Result<MemoryRecord> {
    let seal: String = row.get("seal")?;
    let checksum_kappa = if kind.has_checksum() {
        row.get("checksum_kappa")?
    } else {
        None
    };
    Ok(MemoryRecord {
        user_id: row.get("user_id")?,
        thread_id: row.get("thread_id")?,
        slide_id: row.get("slide_id")?,
        glyph_echo: row.get("glyph_echo")?,
        drift_score: row.get("drift_score")?,
        seal: Seal::from_stored(&seal),
        role: row.get("role")?,
        content: row.get("content")?,
        checksum_kappa,
        ts: row.get("ts")?,
    })
}

/// [`MemoryStore`] over a single SQLite file.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = open_connection(&path, busy_timeout)?;
        tracing::info!(path = %path.display(), "sqlite store ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    /// Private in-memory store, mostly for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::open(IN_MEMORY, Duration::from_secs(5))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` against the connection on the blocking pool.
    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| anyhow!("db lock poisoned: {e}"))?;
            f(&conn)
        })
        .await
        .context("db task failed")?
    }
}

#[async_trait]
impl MemoryStore for SqliteStore {
    fn engine(&self) -> Engine {
        Engine::Sqlite
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn insert(&self, kind: RecordKind, record: &MemoryRecord) -> Result<String> {
        let record = record.clone();
        self.run(move |conn| insert_record(conn, kind, &record)).await
    }

    async fn select(&self, kind: RecordKind, query: &RecordQuery) -> Result<Vec<MemoryRecord>> {
        let query = query.clone();
        self.run(move |conn| select_records(conn, kind, &query)).await
    }

    async fn select_latest_in_group(
        &self,
        kind: RecordKind,
        user_id: &str,
        thread_id: &str,
    ) -> Result<Option<LatestSlide>> {
        let user_id = user_id.to_string();
        let thread_id = thread_id.to_string();
        self.run(move |conn| latest_in_group(conn, kind, &user_id, &thread_id))
            .await
    }
}
