//! Storage backend selection.
//!
//! [`open_store`] runs once at startup: a recognized relational URL gets a
//! pooled PostgreSQL store, anything else (or any failure setting that up)
//! gets the embedded SQLite file. The chosen store serves the whole process.

pub mod postgres;
pub mod query;
pub mod schema;
pub mod sqlite;

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::StorageConfig;
use crate::memory::store::MemoryStore;
use postgres::{is_postgres_url, PostgresStore};
use sqlite::SqliteStore;

/// Select and open the storage backend described by `config`.
///
/// PostgreSQL problems (unreachable host, bad credentials, malformed URL) are
/// logged and answered with the embedded engine. Only a failure to open the
/// embedded file itself is returned as an error.
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn MemoryStore>> {
    let url = config.database_url.trim();
    if is_postgres_url(url) {
        match PostgresStore::connect(url, &config.pool).await {
            Ok(store) => return Ok(Arc::new(store)),
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "postgres unavailable, falling back to sqlite");
            }
        }
    } else if !url.is_empty() {
        tracing::warn!("unrecognized database_url scheme, using sqlite");
    }

    let configured = crate::config::expand_tilde(&config.db_path);
    let path = writable_db_path(&configured);
    let store = SqliteStore::open(&path, Duration::from_millis(config.busy_timeout_ms))?;
    Ok(Arc::new(store))
}

/// `path` if its directory can be written to, otherwise the same file name in
/// the system temp directory.
pub fn writable_db_path(path: &Path) -> PathBuf {
    if path.as_os_str() == sqlite::IN_MEMORY {
        return path.to_path_buf();
    }

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    if dir_is_writable(dir) {
        return path.to_path_buf();
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "memory.db".into());
    let fallback = std::env::temp_dir().join(file_name);
    tracing::warn!(
        configured = %path.display(),
        fallback = %fallback.display(),
        "database directory not writable, using temp directory"
    );
    fallback
}

fn dir_is_writable(dir: &Path) -> bool {
    if std::fs::create_dir_all(dir).is_err() {
        return false;
    }
    let probe = dir.join(format!(".memory-api-probe-{}", std::process::id()));
    match std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&probe)
    {
        Ok(_) => {
            let _ = std::fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}
