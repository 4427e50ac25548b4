// src/config.rs

use std::{env, fmt, str::FromStr};

use dotenvy::dotenv;

/// Default number of optimistic write attempts before a `Conflict` is surfaced.
pub const DEFAULT_MAX_WRITE_RETRIES: u32 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub rust_log: String,
    pub bind_addr: String,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
    /// Attempts per read-compute-write cycle on a progress or enrollment row.
    pub max_write_retries: u32,
}

/// Raised when the environment does not describe a usable configuration.
#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid { key, value } => {
                write!(f, "{} has an invalid value: '{}'", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Loads configuration from the environment (and `.env`, if present).
    ///
    /// | Env Var              | Default                 |
    /// |----------------------|-------------------------|
    /// | `DATABASE_URL`       | required                |
    /// | `JWT_SECRET`         | required                |
    /// | `RUST_LOG`           | `info`                  |
    /// | `BIND_ADDR`          | `0.0.0.0:3000`          |
    /// | `CORS_ORIGINS`       | `http://localhost:3000` |
    /// | `DB_MAX_CONNECTIONS` | `5`                     |
    /// | `MAX_WRITE_RETRIES`  | `5`                     |
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET")?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let db_max_connections = parsed("DB_MAX_CONNECTIONS", 5)?;
        let max_write_retries = parsed("MAX_WRITE_RETRIES", DEFAULT_MAX_WRITE_RETRIES)?;
        if max_write_retries == 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_WRITE_RETRIES",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            database_url,
            jwt_secret,
            rust_log,
            bind_addr,
            cors_origins,
            db_max_connections,
            max_write_retries,
        })
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn parsed<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}
