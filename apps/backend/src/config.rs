//! Server configuration from environment variables.

use std::str::FromStr;

use scheduler_core::algorithm::sm2::Sm2;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },

    #[error("invalid scheduler settings: {0}")]
    Scheduler(#[from] scheduler_core::ScheduleError),
}

/// PostgreSQL connection settings.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub statement_timeout_secs: u64,
}

/// Full server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// `None` runs against the in-memory store.
    pub database: Option<DatabaseConfig>,
    pub scheduler: Sm2,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database: None,
            scheduler: Sm2::default(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Env vars:
    /// - DATABASE_URL: PostgreSQL URL (in-memory store when unset)
    /// - DATABASE_MAX_CONNECTIONS, DATABASE_ACQUIRE_TIMEOUT_SECS, DATABASE_STATEMENT_TIMEOUT_SECS
    /// - HOST, PORT
    /// - SM2_INITIAL_EASE, SM2_MINIMUM_EASE, SM2_LAPSE_PENALTY, SM2_RELEARNING_MINUTES
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Sm2::default();

        let database = match lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()) {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
                acquire_timeout_secs: parse_or(&lookup, "DATABASE_ACQUIRE_TIMEOUT_SECS", 5)?,
                statement_timeout_secs: parse_or(&lookup, "DATABASE_STATEMENT_TIMEOUT_SECS", 5)?,
            }),
            None => None,
        };

        let scheduler = Sm2::with_params(
            parse_or(&lookup, "SM2_INITIAL_EASE", defaults.initial_ease)?,
            parse_or(&lookup, "SM2_MINIMUM_EASE", defaults.minimum_ease)?,
            parse_or(&lookup, "SM2_LAPSE_PENALTY", defaults.lapse_penalty)?,
            parse_or(&lookup, "SM2_RELEARNING_MINUTES", defaults.relearning_minutes)?,
        )?;

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", 3000)?,
            database,
            scheduler,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
