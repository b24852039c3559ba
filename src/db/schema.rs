//! SQL DDL for the `memories` and `reflections` tables.
//!
//! Both engines get the same logical layout: one flat table per record kind,
//! indexed on `ts`, `user_id`, `thread_id`, and `(user_id, thread_id, ts)`.
//! All DDL uses `IF NOT EXISTS` for idempotent initialization.

use crate::db::query::Dialect;
use crate::memory::types::RecordKind;

pub const KINDS: [RecordKind; 2] = [RecordKind::Memory, RecordKind::Reflection];

/// `CREATE TABLE` plus its indexes for one record kind.
pub fn table_ddl(kind: RecordKind, dialect: Dialect) -> String {
    let table = kind.table();
    let (id_col, drift_type, ts_type) = match dialect {
        Dialect::Sqlite => ("id INTEGER PRIMARY KEY AUTOINCREMENT", "REAL", "INTEGER"),
        Dialect::Postgres => ("id BIGSERIAL PRIMARY KEY", "DOUBLE PRECISION", "BIGINT"),
    };
    let checksum_col = if kind.has_checksum() {
        "\n    checksum_kappa TEXT,"
    } else {
        ""
    };

    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    {id_col},
    user_id TEXT NOT NULL,
    thread_id TEXT NOT NULL DEFAULT 'general',
    slide_id TEXT NOT NULL,
    glyph_echo TEXT NOT NULL,
    drift_score {drift_type} NOT NULL,
    seal TEXT NOT NULL DEFAULT 'lawful',
    role TEXT NOT NULL DEFAULT 'assistant',
    content TEXT NOT NULL,{checksum_col}
    ts {ts_type} NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_{table}_ts ON {table}(ts);
CREATE INDEX IF NOT EXISTS idx_{table}_user ON {table}(user_id);
CREATE INDEX IF NOT EXISTS idx_{table}_thread ON {table}(thread_id);
CREATE INDEX IF NOT EXISTS idx_{table}_user_thread_ts ON {table}(user_id, thread_id, ts);
"#
    )
}

/// DDL for every table the service uses.
pub fn schema_sql(dialect: Dialect) -> String {
    KINDS
        .iter()
        .map(|kind| table_ddl(*kind, dialect))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Initialize all schema tables on a SQLite connection. Idempotent.
pub fn init_sqlite_schema(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(&schema_sql(Dialect::Sqlite))
}
