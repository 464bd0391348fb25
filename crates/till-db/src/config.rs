//! # Database Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TILL_DB_PATH=/var/lib/till/till.db                                 │
//! │     TILL_BUSY_TIMEOUT_MS=5000                                          │
//! │     TILL_MAX_INCLUDE_DEPTH=8                                           │
//! │     TILL_LOG_STATEMENTS=true                                           │
//! │                                                                         │
//! │  2. TOML Config File ([database] table)                                │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "./till.db"
//! busy_timeout_ms = 5000
//! foreign_keys = true
//! wal = true
//! max_include_depth = 8
//! log_statements = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use till_core::DEFAULT_MAX_INCLUDE_DEPTH;

use crate::error::{DbError, DbResult};

/// Path understood as a private in-memory database.
pub const MEMORY_PATH: &str = ":memory:";

/// Database configuration.
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use till_db::DbConfig;
///
/// let config = DbConfig::new("./till.db")
///     .busy_timeout(Duration::from_secs(2))
///     .max_include_depth(4);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    #[serde(rename = "path", default = "default_database_path")]
    pub database_path: PathBuf,

    /// How long SQLite waits on a locked file before failing with busy.
    /// Default: 5 seconds
    #[serde(
        rename = "busy_timeout_ms",
        default = "default_busy_timeout",
        with = "millis"
    )]
    pub busy_timeout: Duration,

    /// Enforce foreign key constraints.
    /// Default: true (SQLite disables them unless asked)
    #[serde(default = "default_true")]
    pub foreign_keys: bool,

    /// Use WAL journaling. Ignored for in-memory databases.
    /// Default: true
    #[serde(default = "default_true")]
    pub wal: bool,

    /// Deepest include tree a read may request.
    /// Default: 8
    #[serde(default = "default_max_include_depth")]
    pub max_include_depth: usize,

    /// Log every statement's SQL at debug level.
    /// Default: false
    #[serde(default)]
    pub log_statements: bool,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./till.db")
}

fn default_busy_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_true() -> bool {
    true
}

fn default_max_include_depth() -> usize {
    DEFAULT_MAX_INCLUDE_DEPTH
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        DbConfig::new(default_database_path())
    }
}

/// On-disk layout: settings live under `[database]`.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    database: Option<DbConfig>,
}

impl DbConfig {
    /// Creates a configuration for the database file at `path`.
    ///
    /// ## Arguments
    /// * `path` - Path to the SQLite database file. Created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            busy_timeout: default_busy_timeout(),
            foreign_keys: true,
            wal: true,
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
            log_statements: false,
        }
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let client = Client::connect(DbConfig::in_memory(), schema).await?;
    /// // Database is private to this client, perfect for tests
    /// ```
    pub fn in_memory() -> Self {
        DbConfig {
            wal: false,
            ..DbConfig::new(MEMORY_PATH)
        }
    }

    /// Sets the busy timeout.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets whether foreign keys are enforced.
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Sets whether WAL journaling is used.
    pub fn wal(mut self, enabled: bool) -> Self {
        self.wal = enabled;
        self
    }

    /// Sets the include nesting limit.
    pub fn max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth;
        self
    }

    /// Sets whether statements are logged.
    pub fn log_statements(mut self, enabled: bool) -> Self {
        self.log_statements = enabled;
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path == Path::new(MEMORY_PATH)
    }

    /// Loads configuration: defaults, then the TOML file, then environment.
    ///
    /// ## Arguments
    /// * `config_path` - TOML file to read; a missing file means defaults
    ///
    /// ## Returns
    /// * `Ok(DbConfig)` - Validated configuration
    /// * `Err(DbError::Config)` - Unreadable file, bad TOML or invalid values
    pub fn load(config_path: Option<PathBuf>) -> DbResult<Self> {
        let mut config = DbConfig::default();

        if let Some(path) = config_path {
            if path.exists() {
                info!(?path, "Loading database config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parses the `[database]` table of a TOML document.
    pub fn from_toml_str(contents: &str) -> DbResult<Self> {
        let file: ConfigFile = toml::from_str(contents)?;
        Ok(file.database.unwrap_or_default())
    }

    /// Checks the values are usable.
    pub fn validate(&self) -> DbResult<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(DbError::config("database path must not be empty"));
        }

        if self.max_include_depth == 0 {
            return Err(DbError::config("max_include_depth must be at least 1"));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("TILL_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database_path = PathBuf::from(path);
        }

        if let Ok(timeout) = std::env::var("TILL_BUSY_TIMEOUT_MS") {
            match timeout.parse::<u64>() {
                Ok(ms) => self.busy_timeout = Duration::from_millis(ms),
                Err(_) => warn!(value = %timeout, "Ignoring invalid TILL_BUSY_TIMEOUT_MS"),
            }
        }

        if let Ok(depth) = std::env::var("TILL_MAX_INCLUDE_DEPTH") {
            match depth.parse::<usize>() {
                Ok(depth) => self.max_include_depth = depth,
                Err(_) => warn!(value = %depth, "Ignoring invalid TILL_MAX_INCLUDE_DEPTH"),
            }
        }

        if let Ok(flag) = std::env::var("TILL_LOG_STATEMENTS") {
            match flag.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.log_statements = true,
                "0" | "false" | "no" | "off" => self.log_statements = false,
                _ => warn!(value = %flag, "Ignoring invalid TILL_LOG_STATEMENTS"),
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
