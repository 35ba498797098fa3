//! Process configuration, read once from the environment at startup.

use std::net::SocketAddr;

use stockroom_observability::LogFormat;
use thiserror::Error;

/// Which `ItemStore` backs the service.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("{0} must be set when STORE=postgres")]
    Missing(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub store: StoreBackend,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub log_format: LogFormat,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            store: StoreBackend::Memory,
            database_url: None,
            database_max_connections: 5,
            log_format: LogFormat::Json,
        }
    }
}

impl ApiConfig {
    /// Read `BIND_ADDR`, `STORE`, `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS` and `LOG_FORMAT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`ApiConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bind_addr = match lookup("BIND_ADDR") {
            Some(v) => v.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                var: "BIND_ADDR",
                reason: e.to_string(),
            })?,
            None => defaults.bind_addr,
        };

        let store = match lookup("STORE").as_deref().map(str::trim) {
            None | Some("") | Some("memory") => StoreBackend::Memory,
            Some("postgres") => StoreBackend::Postgres,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "STORE",
                    reason: format!("'{other}' (expected memory or postgres)"),
                });
            }
        };

        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());
        if store == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let database_max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(v) => match v.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "DATABASE_MAX_CONNECTIONS",
                        reason: format!("'{v}' (expected a positive integer)"),
                    });
                }
            },
            None => defaults.database_max_connections,
        };

        let log_format = match lookup("LOG_FORMAT") {
            Some(v) => v.parse().map_err(|reason| ConfigError::Invalid {
                var: "LOG_FORMAT",
                reason,
            })?,
            None => defaults.log_format,
        };

        Ok(Self {
            bind_addr,
            store,
            database_url,
            database_max_connections,
            log_format,
        })
    }
}
