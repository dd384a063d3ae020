use crate::error::ConfigError;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// The root configuration structure for the entire application.
///
/// Every section is optional in the TOML file; missing sections and keys take the
/// defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub storage: StorageSettings,
    pub worker_pool: WorkerPoolSettings,
    pub market_data: MarketDataSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    /// Checks cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let pool = &self.worker_pool;
        if pool.core_workers == 0 {
            return Err(ConfigError::ValidationError(
                "worker_pool.core_workers must be at least 1".to_string(),
            ));
        }
        if pool.max_workers < pool.core_workers {
            return Err(ConfigError::ValidationError(format!(
                "worker_pool.max_workers ({}) must be >= worker_pool.core_workers ({})",
                pool.max_workers, pool.core_workers
            )));
        }
        if pool.queue_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "worker_pool.queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.storage.backend == StorageBackend::Postgres && self.database.url.is_none() {
            return Err(ConfigError::ValidationError(
                "database.url (or DATABASE_URL) must be set for the postgres storage backend".to_string(),
            ));
        }
        if self.server.api_token.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "server.api_token must not be blank when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// HTTP listener and boundary settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// When set, `/api/analysis` requests must present `Authorization: Bearer <token>`.
    pub api_token: Option<String>,
    /// Comma-separated list of allowed CORS origins. Empty allows any origin.
    pub cors_allowed_origins: String,
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::ValidationError(format!("invalid server address: {e}")))
    }

    pub fn allowed_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            api_token: None,
            cors_allowed_origins: String::new(),
        }
    }
}

/// PostgreSQL connection pool settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: u32,
    #[serde(with = "humantime_serde")]
    pub acquire_timeout: Duration,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// Which implementation backs the job and result stores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Job metadata and results in PostgreSQL tables.
    #[default]
    Postgres,
    /// Process-local maps. Nothing survives a restart.
    Memory,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Postgres => "postgres",
            StorageBackend::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
}

/// Sizing of the background pool that executes analysis jobs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WorkerPoolSettings {
    /// Workers started before anything is queued.
    pub core_workers: usize,
    /// Upper bound on workers, reached only while the backlog is full.
    pub max_workers: usize,
    /// Jobs that may wait for a worker. Beyond this the submitter runs the job itself.
    pub queue_capacity: usize,
    /// Idle time after which a worker exits.
    #[serde(with = "humantime_serde")]
    pub keep_alive: Duration,
    /// How long shutdown waits for queued and running jobs.
    #[serde(with = "humantime_serde")]
    pub shutdown_grace: Duration,
}

impl Default for WorkerPoolSettings {
    fn default() -> Self {
        Self {
            core_workers: 5,
            max_workers: 10,
            queue_capacity: 25,
            keep_alive: Duration::from_secs(60),
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

/// Market data provider settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketDataSettings {
    pub base_url: String,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for MarketDataSettings {
    fn default() -> Self {
        Self {
            base_url: "https://query1.finance.yahoo.com".to_string(),
            timeout: Duration::from_secs(10),
            user_agent: "Mozilla/5.0 (compatible; MarketLens/0.1)".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive. `RUST_LOG` takes precedence when set.
    pub level: String,
    /// Directory for daily rolling log files. Logs go to stdout only when unset.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
    /// Emit stdout logs as JSON lines.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_prefix: "marketlens.log".to_string(),
            json: false,
        }
    }
}
