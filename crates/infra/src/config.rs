//! Process configuration read from the environment.

use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;

use thiserror::Error;
use tracing::{info, warn};

pub const DEV_JWT_SECRET: &str = "dev-secret";

/// One year.
pub const MAX_TOKEN_TTL_MINUTES: i64 = 365 * 24 * 60;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
    /// `None` selects the in-memory store.
    pub database: Option<DatabaseConfig>,
    pub bind_addr: SocketAddr,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl_minutes", &self.token_ttl_minutes)
            .field("database", &self.database)
            .field("bind_addr", &self.bind_addr)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = match lookup("JWT_SECRET") {
            Some(secret) if secret.is_empty() => {
                return Err(ConfigError::Invalid {
                    key: "JWT_SECRET",
                    reason: "must not be empty".to_string(),
                });
            }
            Some(secret) => secret,
            None => {
                warn!("JWT_SECRET not set; using an insecure development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        let token_ttl_minutes: i64 = try_load(&lookup, "TOKEN_TTL_MINUTES", "1440")?;
        if !(1..=MAX_TOKEN_TTL_MINUTES).contains(&token_ttl_minutes) {
            return Err(ConfigError::Invalid {
                key: "TOKEN_TTL_MINUTES",
                reason: format!("must be between 1 and {MAX_TOKEN_TTL_MINUTES}"),
            });
        }

        let database = match lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()) {
            Some(url) => {
                let max_connections: u32 = try_load(&lookup, "DATABASE_MAX_CONNECTIONS", "10")?;
                if max_connections == 0 {
                    return Err(ConfigError::Invalid {
                        key: "DATABASE_MAX_CONNECTIONS",
                        reason: "must be at least 1".to_string(),
                    });
                }
                Some(DatabaseConfig { url, max_connections })
            }
            None => {
                info!("DATABASE_URL not set, using the in-memory store");
                None
            }
        };

        let bind_addr = try_load(&lookup, "BIND_ADDR", "0.0.0.0:8080")?;

        Ok(Self {
            jwt_secret,
            token_ttl_minutes,
            database,
            bind_addr,
        })
    }

    pub fn token_ttl(&self) -> Result<chrono::Duration, ConfigError> {
        chrono::Duration::try_minutes(self.token_ttl_minutes)
            .filter(|_| (1..=MAX_TOKEN_TTL_MINUTES).contains(&self.token_ttl_minutes))
            .ok_or_else(|| ConfigError::Invalid {
                key: "TOKEN_TTL_MINUTES",
                reason: format!("must be between 1 and {MAX_TOKEN_TTL_MINUTES}"),
            })
    }
}

fn try_load<T, F>(lookup: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}
