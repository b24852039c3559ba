//! Pooled PostgreSQL backend.
//!
//! A `deadpool-postgres` pool over `tokio-postgres`. Each operation checks one
//! client out of the pool and returns it when the call finishes; pool waits are
//! left to the pool's own behavior.

use anyhow::{Context, Result};
use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use std::time::Duration;
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row};

use crate::config::PoolConfig;
use crate::db::query::{self, Dialect, SqlValue};
use crate::db::schema;
use crate::memory::store::{Engine, MemoryStore};
use crate::memory::types::{LatestSlide, MemoryRecord, RecordKind, RecordQuery, Seal};

/// Upper bound on establishing a single connection, so an unreachable host
/// fails selection quickly instead of hanging startup.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// URL schemes that select this backend.
const SCHEMES: [&str; 2] = ["postgres://", "postgresql://"];

/// `true` if `url` names a PostgreSQL database.
pub fn is_postgres_url(url: &str) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    SCHEMES.iter().any(|scheme| lower.starts_with(scheme))
}

fn as_sql(value: &SqlValue) -> &(dyn ToSql + Sync) {
    match value {
        SqlValue::Text(s) => s,
        SqlValue::Int(i) => i,
        SqlValue::Real(f) => f,
        SqlValue::OptionalText(o) => o,
    }
}

fn bind(params: &[SqlValue]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(as_sql).collect()
}

/// [`MemoryStore`] over a PostgreSQL connection pool.
pub struct PostgresStore {
    pool: Pool,
    location: String,
}

impl PostgresStore {
    /// Open the pool, create the schema, and run a smoke-test round trip.
    ///
    /// Any failure here (bad URL, unreachable host, bad credentials) is
    /// returned so the caller can fall back to the embedded engine.
    pub async fn connect(url: &str, pool_config: &PoolConfig) -> Result<Self> {
        let mut pg_config = url
            .trim()
            .parse::<tokio_postgres::Config>()
            .context("invalid postgres connection url")?;
        pg_config.connect_timeout(CONNECT_TIMEOUT);

        let location = describe(&pg_config);
        let manager = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        let max_size = pool_config.max_size.max(1);
        let min_size = pool_config.min_size.min(max_size);
        let pool = Pool::builder(manager)
            .max_size(max_size)
            .runtime(Runtime::Tokio1)
            .create_timeout(Some(CONNECT_TIMEOUT))
            .build()
            .context("failed to build postgres pool")?;

        let store = Self { pool, location };
        store.init_schema().await?;
        store.smoke_test().await?;
        store.warm(min_size).await?;

        tracing::info!(location = %store.location, max_size, "postgres store ready");
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        let client = self.client().await?;
        client
            .batch_execute(&schema::schema_sql(Dialect::Postgres))
            .await
            .context("failed to initialize postgres schema")?;
        Ok(())
    }

    async fn smoke_test(&self) -> Result<()> {
        let client = self.client().await?;
        let row = client
            .query_one("SELECT 1::INT4", &[])
            .await
            .context("postgres smoke test failed")?;
        let one: i32 = row.get(0);
        anyhow::ensure!(one == 1, "postgres smoke test returned {one}");
        Ok(())
    }

    /// Open `count` connections up front so the first requests do not pay for them.
    async fn warm(&self, count: usize) -> Result<()> {
        let mut held = Vec::with_capacity(count);
        for _ in 0..count {
            held.push(self.client().await?);
        }
        tracing::debug!(connections = held.len(), "postgres pool warmed");
        Ok(())
    }

    async fn client(&self) -> Result<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .context("failed to get postgres connection from pool")
    }
}

/// `host:port/dbname` without credentials.
fn describe(config: &tokio_postgres::Config) -> String {
    let host = config
        .get_hosts()
        .first()
        .map(|h| match h {
            tokio_postgres::config::Host::Tcp(s) => s.clone(),
            #[cfg(unix)]
            tokio_postgres::config::Host::Unix(p) => p.display().to_string(),
        })
        .unwrap_or_else(|| "localhost".to_string());
    let port = config.get_ports().first().copied().unwrap_or(5432);
    let db = config.get_dbname().unwrap_or("");
    format!("{host}:{port}/{db}")
}

fn record_from_row(row: &Row, kind: RecordKind) -> Result<MemoryRecord> {
    let seal: String = row.try_get("seal")?;
    let checksum_kappa = if kind.has_checksum() {
        row.try_get("checksum_kappa")?
    } else {
        None
    };
    Ok(MemoryRecord {
        user_id: row.try_get("user_id")?,
        thread_id: row.try_get("thread_id")?,
        slide_id: row.try_get("slide_id")?,
        glyph_echo: row.try_get("glyph_echo")?,
        drift_score: row.try_get("drift_score")?,
        seal: Seal::from_stored(&seal),
        role: row.try_get("role")?,
        content: row.try_get("content")?,
        checksum_kappa,
        ts: row.try_get("ts")?,
    })
}

#[async_trait]
impl MemoryStore for PostgresStore {
    fn engine(&self) -> Engine {
        Engine::Postgres
    }

    fn location(&self) -> String {
        self.location.clone()
    }

    async fn insert(&self, kind: RecordKind, record: &MemoryRecord) -> Result<String> {
        let client = self.client().await?;
        let sql = query::insert_sql(kind, Dialect::Postgres);
        let params = query::insert_params(kind, record);
        client
            .execute(&sql, &bind(&params))
            .await
            .with_context(|| format!("failed to insert into {}", kind.table()))?;
        Ok(record.slide_id.clone())
    }

    async fn select(&self, kind: RecordKind, query: &RecordQuery) -> Result<Vec<MemoryRecord>> {
        let client = self.client().await?;
        let stmt = query::select_statement(kind, query, Dialect::Postgres);
        let rows = client
            .query(&stmt.sql, &bind(&stmt.params))
            .await
            .with_context(|| format!("failed to read from {}", kind.table()))?;
        rows.iter().map(|row| record_from_row(row, kind)).collect()
    }

    async fn select_latest_in_group(
        &self,
        kind: RecordKind,
        user_id: &str,
        thread_id: &str,
    ) -> Result<Option<LatestSlide>> {
        let client = self.client().await?;
        let sql = query::latest_in_group_sql(kind, Dialect::Postgres);
        let row = client
            .query_opt(&sql, &[&user_id, &thread_id])
            .await
            .with_context(|| format!("failed to read latest from {}", kind.table()))?;
        row.map(|r| {
            Ok::<_, anyhow::Error>(LatestSlide {
                slide_id: r.try_get("slide_id")?,
                ts: r.try_get("ts")?,
            })
        })
        .transpose()
    }
}
