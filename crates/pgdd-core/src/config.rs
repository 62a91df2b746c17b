//! Configuration schema (pgdd.toml)
//!
//! Every section and field is optional; missing values fall back to the
//! defaults below. Command-line flags and `PDD_*` environment variables
//! are applied on top by the CLI.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default database address
pub const DEFAULT_ADDR: &str = "localhost:5432";

/// Default PostgreSQL port when the address has none
pub const DEFAULT_PORT: u16 = 5432;

/// Default manifest location
pub const DEFAULT_MANIFEST_FILE: &str = "manifest.yaml";

/// Default filesystem backend root
pub const DEFAULT_FILESYSTEM_ROOT: &str = "/tmp/pdd";

/// Filesystem backend name
pub const BACKEND_FILESYSTEM: &str = "filesystem";

/// Source database connection settings
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `host:port`, or a bare host
    pub addr: String,

    /// Database name
    pub database: String,

    /// Database user
    pub user: String,

    /// Database password
    pub password: String,

    /// Use TLS
    pub ssl: bool,

    /// Connection attempts after the first failure
    pub max_retries: u32,

    /// Connect timeout in seconds
    pub dial_timeout_secs: u64,

    /// Timeout for metadata queries in seconds
    pub read_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            database: "postgres".to_string(),
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            ssl: false,
            max_retries: 0,
            dial_timeout_secs: 5,
            read_timeout_secs: 30,
        }
    }
}

impl DatabaseConfig {
    /// Split the address into host and port
    pub fn host_port(&self) -> Result<(String, u16), ConfigError> {
        let addr = self.addr.trim();
        if addr.is_empty() {
            return Err(ConfigError::Invalid("database address is empty".to_string()));
        }

        // Unix socket directories have no port component
        if addr.starts_with('/') {
            return Ok((addr.to_string(), DEFAULT_PORT));
        }

        match addr.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| {
                    ConfigError::Invalid(format!("invalid port in database address '{}'", addr))
                })?;
                Ok((host.to_string(), port))
            }
            None => Ok((addr.to_string(), DEFAULT_PORT)),
        }
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("addr", &self.addr)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("ssl", &self.ssl)
            .field("max_retries", &self.max_retries)
            .field("dial_timeout_secs", &self.dial_timeout_secs)
            .field("read_timeout_secs", &self.read_timeout_secs)
            .finish()
    }
}

/// Dump settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpConfig {
    /// Path to the manifest document
    pub manifest_file: PathBuf,

    /// Fail on undefined template variables instead of rendering them empty
    pub strict_vars: bool,

    /// Render extraction queries as Jinja templates instead of `$name` placeholders
    pub jinja: bool,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            manifest_file: PathBuf::from(DEFAULT_MANIFEST_FILE),
            strict_vars: false,
            jinja: false,
        }
    }
}

/// Filesystem backend settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSystemConfig {
    /// Directory dumps are written into
    pub root: PathBuf,
}

impl Default for FileSystemConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_FILESYSTEM_ROOT),
        }
    }
}

/// Storage settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend type (filesystem)
    pub backend: String,

    /// Upper bound for the whole transfer in seconds
    pub timeout_secs: u64,

    /// Filesystem backend settings
    pub filesystem: FileSystemConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BACKEND_FILESYSTEM.to_string(),
            timeout_secs: 180,
            filesystem: FileSystemConfig::default(),
        }
    }
}

impl StorageConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Log filtering level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            other => Err(ConfigError::Invalid(format!(
                "unknown log level '{}' (expected error, warn, info or debug)",
                other
            ))),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Fmt,

    /// One JSON object per line
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fmt" => Ok(LogFormat::Fmt),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigError::Invalid(format!(
                "unknown log format '{}' (expected fmt or json)",
                other
            ))),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source database connection
    pub database: DatabaseConfig,

    /// Dump settings
    pub dump: DumpConfig,

    /// Storage backend
    pub storage: StorageConfig,

    /// Logging
    pub logging: LoggingConfig,
}

impl Config {
    /// Load config from TOML file
    ///
    /// A relative manifest path is resolved against the config file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        let mut config = Self::from_toml(&contents)?;

        if config.dump.manifest_file.is_relative() {
            if let Some(parent) = path.parent() {
                config.dump.manifest_file = parent.join(&config.dump.manifest_file);
            }
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Check values that cannot be validated while parsing
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database.host_port()?;

        if self.storage.backend != BACKEND_FILESYSTEM {
            return Err(ConfigError::Invalid(format!(
                "unknown storage backend '{}' (supported: {})",
                self.storage.backend, BACKEND_FILESYSTEM
            )));
        }

        if self.storage.timeout_secs == 0 {
            return Err(ConfigError::Invalid("storage timeout must be positive".to_string()));
        }

        Ok(())
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
