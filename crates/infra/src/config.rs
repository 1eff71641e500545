//! Process configuration from environment variables.
//!
//! `from_env` loads an optional `.env` file first; `from_lookup` takes any
//! key lookup so tests never touch the real environment.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_JWT_SECRET: &str = "dev-secret";
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 60;
/// One year.
pub const MAX_TOKEN_TTL_MINUTES: i64 = 525_600;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} is not valid: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("{0} must be set when USE_PERSISTENT_STORES is enabled")]
    Missing(&'static str),
}

/// Where ledger and user data live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    InMemory,
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub store: StoreBackend,
    pub lock_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env is normal outside development.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = match var("BIND_ADDR") {
            Some(addr) => parse("BIND_ADDR", &addr)?,
            None => {
                let port: u16 = match var("PORT") {
                    Some(port) => parse("PORT", &port)?,
                    None => DEFAULT_PORT,
                };
                SocketAddr::from(([0, 0, 0, 0], port))
            }
        };

        let jwt_secret = var("JWT_SECRET").unwrap_or_else(|| {
            warn!("JWT_SECRET not set; using insecure dev default");
            DEFAULT_JWT_SECRET.to_string()
        });

        let ttl_minutes: i64 = match var("TOKEN_TTL_MINUTES") {
            Some(v) => parse("TOKEN_TTL_MINUTES", &v)?,
            None => DEFAULT_TOKEN_TTL_MINUTES,
        };
        if ttl_minutes <= 0 {
            return Err(ConfigError::Invalid {
                key: "TOKEN_TTL_MINUTES",
                reason: "must be positive".to_string(),
            });
        }
        let token_ttl = (ttl_minutes <= MAX_TOKEN_TTL_MINUTES)
            .then(|| chrono::Duration::try_minutes(ttl_minutes))
            .flatten()
            .ok_or_else(|| ConfigError::Invalid {
                key: "TOKEN_TTL_MINUTES",
                reason: format!("must be at most {MAX_TOKEN_TTL_MINUTES}"),
            })?;

        let lock_timeout_ms: u64 = match var("LOCK_TIMEOUT_MS") {
            Some(v) => parse("LOCK_TIMEOUT_MS", &v)?,
            None => DEFAULT_LOCK_TIMEOUT_MS,
        };
        // Postgres reads 0 as "wait forever"; the in-memory store would fail at once.
        if lock_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "LOCK_TIMEOUT_MS",
                reason: "must be positive".to_string(),
            });
        }

        let persistent = var("USE_PERSISTENT_STORES")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let store = if persistent {
            let database_url = var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
            let max_connections = match var("DB_MAX_CONNECTIONS") {
                Some(v) => parse("DB_MAX_CONNECTIONS", &v)?,
                None => DEFAULT_DB_MAX_CONNECTIONS,
            };
            StoreBackend::Postgres {
                database_url,
                max_connections,
            }
        } else {
            StoreBackend::InMemory
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            token_ttl,
            store,
            lock_timeout: Duration::from_millis(lock_timeout_ms),
        })
    }
}

fn parse<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}
