//! Server configuration

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Where the SQLite file lives unless `DATABASE_PATH` says otherwise
pub const DEFAULT_DATABASE_PATH: &str = "data/orders.db";

/// Value of `DATABASE_PATH` that selects an in-memory store
pub const IN_MEMORY_DATABASE: &str = ":memory:";

/// Configuration for the API server
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    /// Address to bind
    pub host: IpAddr,
    /// Port to bind
    pub port: u16,
    /// SQLite database file, or `:memory:`
    pub database_path: String,
    /// How long one subscriber may take to accept a broadcast frame
    pub send_timeout: Duration,
    /// Public host name echoed by `/ws-test`
    pub public_host: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: 8000,
            database_path: DEFAULT_DATABASE_PATH.to_string(),
            send_timeout: trade_services::DEFAULT_SEND_TIMEOUT,
            public_host: None,
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables
    ///
    /// Reads SERVER_HOST, SERVER_PORT, DATABASE_PATH,
    /// BROADCAST_SEND_TIMEOUT_MS and HOST. Unset variables keep their
    /// defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(host) = lookup("SERVER_HOST") {
            config.host = parse("SERVER_HOST", &host)?;
        }
        if let Some(port) = lookup("SERVER_PORT") {
            config.port = parse("SERVER_PORT", &port)?;
        }
        if let Some(path) = lookup("DATABASE_PATH") {
            if path.trim().is_empty() {
                return Err(ConfigError::Empty("DATABASE_PATH"));
            }
            config.database_path = path;
        }
        if let Some(ms) = lookup("BROADCAST_SEND_TIMEOUT_MS") {
            let ms: u64 = parse("BROADCAST_SEND_TIMEOUT_MS", &ms)?;
            if ms == 0 {
                return Err(ConfigError::Invalid {
                    field: "BROADCAST_SEND_TIMEOUT_MS",
                    error: "must be greater than zero".to_string(),
                });
            }
            config.send_timeout = Duration::from_millis(ms);
        }
        config.public_host = lookup("HOST");

        Ok(config)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path == IN_MEMORY_DATABASE
    }
}

fn parse<T>(field: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        field,
        error: e.to_string(),
    })
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {error}")]
    Invalid { field: &'static str, error: String },

    #[error("{0} cannot be empty")]
    Empty(&'static str),
}
