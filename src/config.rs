use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct MemoryApiConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub limits: LimitsConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    /// `text` or `json`.
    pub log_format: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// Relational connection string. Empty means embedded only.
    pub database_url: String,
    /// Embedded database file. `:memory:` opens a private in-memory database.
    pub db_path: String,
    pub busy_timeout_ms: u64,
    #[serde(flatten)]
    pub pool: PoolConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PoolConfig {
    #[serde(rename = "pool_min_size")]
    pub min_size: usize,
    #[serde(rename = "pool_max_size")]
    pub max_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_content_chars: usize,
    pub default_limit: u32,
    pub max_limit: u32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SecurityConfig {
    pub api_key: String,
    /// Exact origins, or `"*"` for any.
    pub allowed_origins: Vec<String>,
    pub rate_limit_window_secs: u64,
    /// Requests per client per window. `0` disables limiting.
    pub rate_limit_max_requests: usize,
    /// Key the rate limiter on the first `X-Forwarded-For` hop instead of the peer address.
    pub trust_forwarded_for: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 10000,
            log_level: "info".into(),
            log_format: "text".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_data_dir()
            .join("memory.db")
            .to_string_lossy()
            .into_owned();
        Self {
            database_url: String::new(),
            db_path,
            busy_timeout_ms: 5000,
            pool: PoolConfig::default(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: 10,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_content_chars: 65536,
            default_limit: 50,
            max_limit: 200,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            allowed_origins: vec!["*".into()],
            rate_limit_window_secs: 60,
            rate_limit_max_requests: 120,
            trust_forwarded_for: false,
        }
    }
}

/// Returns `~/.memory-api/`, or `./.memory-api/` when there is no home directory.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".memory-api")
}

/// Returns the default config file path: `~/.memory-api/config.toml`
pub fn default_config_path() -> PathBuf {
    default_data_dir().join("config.toml")
}

impl MemoryApiConfig {
    /// Load config from the default TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            MemoryApiConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("MEMORY_API_HOST") {
            self.server.host = val;
        }
        override_parsed(&lookup, "PORT", &mut self.server.port);
        if let Some(val) = lookup("MEMORY_API_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Some(val) = lookup("MEMORY_API_LOG_FORMAT") {
            self.server.log_format = val;
        }

        if let Some(val) = lookup("DATABASE_URL") {
            self.storage.database_url = val;
        }
        if let Some(val) = lookup("MEMORY_API_DB") {
            self.storage.db_path = val;
        }
        override_parsed(&lookup, "MEMORY_API_POOL_MIN", &mut self.storage.pool.min_size);
        override_parsed(&lookup, "MEMORY_API_POOL_MAX", &mut self.storage.pool.max_size);

        override_parsed(
            &lookup,
            "MEMORY_API_MAX_CONTENT",
            &mut self.limits.max_content_chars,
        );

        if let Some(val) = lookup("MEMORY_API_KEY") {
            self.security.api_key = val;
        }
        if let Some(val) =
            lookup("MEMORY_API_ALLOWED_ORIGINS").or_else(|| lookup("ALLOWED_ORIGIN"))
        {
            self.security.allowed_origins = split_list(&val);
        }
        override_parsed(
            &lookup,
            "MEMORY_API_RATE_WINDOW_SECS",
            &mut self.security.rate_limit_window_secs,
        );
        override_parsed(
            &lookup,
            "MEMORY_API_RATE_MAX",
            &mut self.security.rate_limit_max_requests,
        );
    }
}

fn override_parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    target: &mut T,
) {
    if let Some(raw) = lookup(name) {
        match raw.trim().parse() {
            Ok(val) => *target = val,
            Err(_) => warn!(var = name, value = %raw, "ignoring unparseable override"),
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
