use crate::error::ConfigError;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// The root configuration structure for the entire application.
///
/// Every section has defaults, so a file only needs to name what it changes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub web: WebConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub log: LogConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Socket address to bind, e.g. "0.0.0.0:4000".
    pub listen: String,
    /// Origins allowed by the CORS layer. Empty means any origin.
    pub cors_allowed_origins: Vec<String>,
}

/// PostgreSQL connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub max_connections: u32,
    /// Deadline applied to every SQL call, in milliseconds.
    pub query_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Lifetime of a freshly issued session.
    pub ttl_hours: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// When set, logs are also written to a daily-rolling file in this directory.
    pub directory: Option<PathBuf>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:4000".to_string(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "classbook".to_string(),
            password: "classbook".to_string(),
            dbname: "classbook".to_string(),
            max_connections: 10,
            query_timeout_ms: 3000,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { ttl_hours: 24 * 7 }
    }
}

impl WebConfig {
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen
            .parse()
            .map_err(|_| ConfigError::invalid("web.listen", format!("'{}' is not a socket address", self.listen)))
    }
}

impl DatabaseConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

impl Config {
    /// Rejects values that would only fail later at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.web.listen_addr()?;
        if self.database.max_connections == 0 {
            return Err(ConfigError::invalid("database.max_connections", "must be positive"));
        }
        if self.database.query_timeout_ms == 0 {
            return Err(ConfigError::invalid("database.query_timeout_ms", "must be positive"));
        }
        if self.session.ttl_hours <= 0 {
            return Err(ConfigError::invalid("session.ttl_hours", "must be positive"));
        }
        Ok(())
    }
}
