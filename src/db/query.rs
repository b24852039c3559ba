//! Parameterized SQL shared by both engines.
//!
//! Statements are built once here and differ between engines only in the
//! placeholder syntax (`?N` for SQLite, `$N` for PostgreSQL). Values always
//! travel as bound parameters, never spliced into the SQL text.

use crate::memory::types::{MemoryRecord, RecordKind, RecordQuery};

/// Placeholder style of the target engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    fn placeholder(&self, index: usize) -> String {
        match self {
            Self::Sqlite => format!("?{index}"),
            Self::Postgres => format!("${index}"),
        }
    }
}

/// A bound parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Int(i64),
    Real(f64),
    OptionalText(Option<String>),
}

/// SQL text plus its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Columns in the order every statement reads and writes them.
pub fn columns(kind: RecordKind) -> &'static [&'static str] {
    match kind {
        RecordKind::Memory => &[
            "user_id",
            "thread_id",
            "slide_id",
            "glyph_echo",
            "drift_score",
            "seal",
            "role",
            "content",
            "ts",
        ],
        RecordKind::Reflection => &[
            "user_id",
            "thread_id",
            "slide_id",
            "glyph_echo",
            "drift_score",
            "seal",
            "role",
            "content",
            "checksum_kappa",
            "ts",
        ],
    }
}

/// `INSERT` with one placeholder per column in [`columns`] order.
pub fn insert_sql(kind: RecordKind, dialect: Dialect) -> String {
    let cols = columns(kind);
    let placeholders: Vec<String> = (1..=cols.len()).map(|i| dialect.placeholder(i)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        kind.table(),
        cols.join(", "),
        placeholders.join(", ")
    )
}

/// Values for [`insert_sql`], in [`columns`] order.
pub fn insert_params(kind: RecordKind, record: &MemoryRecord) -> Vec<SqlValue> {
    let mut params = vec![
        SqlValue::Text(record.user_id.clone()),
        SqlValue::Text(record.thread_id.clone()),
        SqlValue::Text(record.slide_id.clone()),
        SqlValue::Text(record.glyph_echo.clone()),
        SqlValue::Real(record.drift_score),
        SqlValue::Text(record.seal.as_str().to_string()),
        SqlValue::Text(record.role.clone()),
        SqlValue::Text(record.content.clone()),
    ];
    if kind.has_checksum() {
        params.push(SqlValue::OptionalText(record.checksum_kappa.clone()));
    }
    params.push(SqlValue::Int(record.ts));
    params
}

/// Filtered, cursor-bounded, newest-first read.
pub fn select_statement(kind: RecordKind, query: &RecordQuery, dialect: Dialect) -> Statement {
    let mut clauses = Vec::new();
    let mut params = Vec::new();

    for (column, value) in query.filters.active() {
        params.push(SqlValue::Text(value.to_string()));
        clauses.push(format!("{column} = {}", dialect.placeholder(params.len())));
    }

    if let Some(before) = query.before_ts {
        params.push(SqlValue::Int(before));
        clauses.push(format!("ts < {}", dialect.placeholder(params.len())));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };

    params.push(SqlValue::Int(i64::from(query.limit)));
    let sql = format!(
        "SELECT {} FROM {}{} ORDER BY ts DESC, id DESC LIMIT {}",
        columns(kind).join(", "),
        kind.table(),
        where_sql,
        dialect.placeholder(params.len())
    );

    Statement { sql, params }
}

/// Newest `(slide_id, ts)` for one `(user_id, thread_id)` group.
pub fn latest_in_group_sql(kind: RecordKind, dialect: Dialect) -> String {
    format!(
        "SELECT slide_id, ts FROM {} WHERE user_id = {} AND thread_id = {} \
         ORDER BY ts DESC, id DESC LIMIT 1",
        kind.table(),
        dialect.placeholder(1),
        dialect.placeholder(2)
    )
}
