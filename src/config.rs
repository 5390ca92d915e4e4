//! Configuration loading for the mirror task scheduler.
//!
//! Values come from `MIRROR_*` environment variables, optionally seeded from a
//! `.env` file in the working directory. Parsing goes through a lookup
//! function so callers and tests can supply values without touching the
//! process environment.

use std::{env, fmt, time::Duration};

use thiserror::Error;

/// Prefix shared by every scheduler environment variable.
pub const ENV_PREFIX: &str = "MIRROR_";

const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_DB_CONNECTION_TIMEOUT_SECS: u64 = 30;
const DEFAULT_IDLE_POLL_INTERVAL_MS: u64 = 5_000;
const DEFAULT_CANCELLATION_POLL_INTERVAL_MS: u64 = 2_000;
const DEFAULT_MAX_RETRY_COUNT: u32 = 3;
const DEFAULT_LOG_LEVEL: &str = "info";

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Human-readable multi-line output.
    Pretty,
}

impl LogFormat {
    /// Returns the configuration value for this format.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for LogFormat {
    type Error = ConfigError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            _ => Err(ConfigError::InvalidLogFormat(value.to_owned())),
        }
    }
}

/// Scheduler, pool and logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// `PostgreSQL` connection URL; absent for in-memory deployments.
    pub database_url: Option<String>,
    /// Maximum size of the r2d2 pool.
    pub db_max_connections: u32,
    /// How long a checkout waits for a free pooled connection.
    pub db_connection_timeout: Duration,
    /// Sleep between claim attempts while the queue is empty.
    pub idle_poll_interval: Duration,
    /// Interval at which cancellation watches re-read their task.
    pub cancellation_poll_interval: Duration,
    /// Failed attempts tolerated before a task is marked fatal.
    pub max_retry_count: u32,
    /// Default `tracing` filter directive.
    pub log_level: String,
    /// Output format of the tracing subscriber.
    pub log_format: LogFormat,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            db_connection_timeout: Duration::from_secs(DEFAULT_DB_CONNECTION_TIMEOUT_SECS),
            idle_poll_interval: Duration::from_millis(DEFAULT_IDLE_POLL_INTERVAL_MS),
            cancellation_poll_interval: Duration::from_millis(
                DEFAULT_CANCELLATION_POLL_INTERVAL_MS,
            ),
            max_retry_count: DEFAULT_MAX_RETRY_COUNT,
            log_level: DEFAULT_LOG_LEVEL.to_owned(),
            log_format: LogFormat::default(),
        }
    }
}

impl SchedulerConfig {
    /// Loads `.env` if present, then reads `MIRROR_*` variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EnvFile`] when a `.env` file exists but cannot
    /// be parsed, or any parsing or validation error from
    /// [`SchedulerConfig::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            return Err(ConfigError::EnvFile(err));
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a configuration from `lookup`, which receives full variable
    /// names such as `MIRROR_DATABASE_URL`.
    ///
    /// Unset and blank variables fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for unparsable numbers,
    /// [`ConfigError::InvalidLogFormat`] for unknown formats, and any error
    /// from [`SchedulerConfig::validate`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        let log_format = match read("LOG_FORMAT") {
            Some(raw) => LogFormat::try_from(raw.as_str())?,
            None => defaults.log_format,
        };

        let config = Self {
            database_url: read("DATABASE_URL"),
            db_max_connections: parse_or(
                "DB_MAX_CONNECTIONS",
                read("DB_MAX_CONNECTIONS"),
                defaults.db_max_connections,
            )?,
            db_connection_timeout: Duration::from_secs(parse_or(
                "DB_CONNECTION_TIMEOUT_SECS",
                read("DB_CONNECTION_TIMEOUT_SECS"),
                DEFAULT_DB_CONNECTION_TIMEOUT_SECS,
            )?),
            idle_poll_interval: Duration::from_millis(parse_or(
                "IDLE_POLL_INTERVAL_MS",
                read("IDLE_POLL_INTERVAL_MS"),
                DEFAULT_IDLE_POLL_INTERVAL_MS,
            )?),
            cancellation_poll_interval: Duration::from_millis(parse_or(
                "CANCELLATION_POLL_INTERVAL_MS",
                read("CANCELLATION_POLL_INTERVAL_MS"),
                DEFAULT_CANCELLATION_POLL_INTERVAL_MS,
            )?),
            max_retry_count: parse_or(
                "MAX_RETRY_COUNT",
                read("MAX_RETRY_COUNT"),
                defaults.max_retry_count,
            )?,
            log_level: read("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroValue`] for a zero pool size or a zero
    /// interval.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.db_max_connections == 0 {
            return Err(ConfigError::ZeroValue("DB_MAX_CONNECTIONS"));
        }
        if self.db_connection_timeout.is_zero() {
            return Err(ConfigError::ZeroValue("DB_CONNECTION_TIMEOUT_SECS"));
        }
        if self.idle_poll_interval.is_zero() {
            return Err(ConfigError::ZeroValue("IDLE_POLL_INTERVAL_MS"));
        }
        if self.cancellation_poll_interval.is_zero() {
            return Err(ConfigError::ZeroValue("CANCELLATION_POLL_INTERVAL_MS"));
        }
        Ok(())
    }

    /// Returns the database URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingDatabaseUrl`] when no URL is configured.
    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::MissingDatabaseUrl)
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    raw.map_or(Ok(default), |value| {
        value
            .parse()
            .map_err(|err: T::Err| ConfigError::InvalidValue {
                key,
                reason: err.to_string(),
                value,
            })
    })
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The `.env` file exists but could not be read.
    #[error("failed to load .env file: {0}")]
    EnvFile(#[source] dotenvy::Error),

    /// A variable holds a value of the wrong type.
    #[error("invalid value '{value}' for MIRROR_{key}: {reason}")]
    InvalidValue {
        /// Variable name without the prefix.
        key: &'static str,
        /// Raw value.
        value: String,
        /// Parser message.
        reason: String,
    },

    /// The log format is neither `json` nor `pretty`.
    #[error("invalid log format '{0}', expected 'json' or 'pretty'")]
    InvalidLogFormat(String),

    /// A size or interval that must be positive is zero.
    #[error("MIRROR_{0} must be greater than zero")]
    ZeroValue(&'static str),

    /// A `PostgreSQL` adapter was requested without a database URL.
    #[error("database URL is missing; set MIRROR_DATABASE_URL")]
    MissingDatabaseUrl,
}
