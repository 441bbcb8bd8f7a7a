use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database_path: String,
    pub jwt_secret_key: String,
    pub jwt_issuer: Option<String>,
    pub auth_clock_skew: Duration,
    pub sync_batch_limit: usize,
    pub rate_limit_window: Duration,
    pub sync_rate_limit_per_window: u32,
    pub notes_rate_limit_per_window: u32,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("database_path", &self.database_path)
            .field("jwt_secret_key", &"[REDACTED]")
            .field("jwt_issuer", &self.jwt_issuer)
            .field("auth_clock_skew", &self.auth_clock_skew)
            .field("sync_batch_limit", &self.sync_batch_limit)
            .field("rate_limit_window", &self.rate_limit_window)
            .field(
                "sync_rate_limit_per_window",
                &self.sync_rate_limit_per_window,
            )
            .field(
                "notes_rate_limit_per_window",
                &self.notes_rate_limit_per_window,
            )
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "FIELDNOTES_BIND_ADDR", "127.0.0.1:8080");
        let database_path =
            value_or_default(&lookup, "FIELDNOTES_DATABASE_PATH", "fieldnotes.db");

        let jwt_secret_key = required_trimmed(&lookup, "JWT_SECRET_KEY")?;
        let jwt_issuer = optional_trimmed(&lookup, "JWT_ISSUER");

        let auth_clock_skew_secs: u64 =
            bounded(&lookup, "AUTH_CLOCK_SKEW_SECS", "60", 0, 300)?;
        let sync_batch_limit: usize = bounded(&lookup, "SYNC_BATCH_LIMIT", "1000", 1, 5_000)?;
        let rate_limit_window_secs: u64 =
            bounded(&lookup, "RATE_LIMIT_WINDOW_SECS", "60", 10, 3_600)?;
        let sync_rate_limit_per_window: u32 =
            bounded(&lookup, "SYNC_RATE_LIMIT_PER_WINDOW", "60", 1, 1_000)?;
        let notes_rate_limit_per_window: u32 =
            bounded(&lookup, "NOTES_RATE_LIMIT_PER_WINDOW", "300", 1, 5_000)?;

        Ok(Self {
            bind_addr,
            database_path,
            jwt_secret_key,
            jwt_issuer,
            auth_clock_skew: Duration::from_secs(auth_clock_skew_secs),
            sync_batch_limit,
            rate_limit_window: Duration::from_secs(rate_limit_window_secs),
            sync_rate_limit_per_window,
            notes_rate_limit_per_window,
        })
    }
}

/// Parse an integer variable and check it against an inclusive range
fn bounded<T>(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: &str,
    min: T,
    max: T,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + fmt::Display,
{
    let value = value_or_default(lookup, name, default)
        .parse::<T>()
        .map_err(|_| {
            ConfigError::Invalid(format!("{name} must be an integer in [{min}, {max}]"))
        })?;
    if value < min || value > max {
        return Err(ConfigError::Invalid(format!(
            "{name} must be in [{min}, {max}]"
        )));
    }
    Ok(value)
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn required_trimmed(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    optional_trimmed(lookup, name).ok_or(ConfigError::MissingVar(name))
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
