use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:vote_bar.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_ROOM_MAX_AGE_HOURS: i64 = 24;
pub const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 60;
pub const DEFAULT_ROOM_CODE_LENGTH: usize = 6;

const MIN_ROOM_CODE_LENGTH: usize = 4;
const MAX_ROOM_CODE_LENGTH: usize = 12;
/// Ten years.
const MAX_ROOM_MAX_AGE_HOURS: i64 = 24 * 365 * 10;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    /// Rooms idle for longer than this are deleted by the sweep.
    pub room_max_age: chrono::Duration,
    pub sweep_interval: Duration,
    pub room_code_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            room_max_age: chrono::Duration::hours(DEFAULT_ROOM_MAX_AGE_HOURS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECONDS),
            room_code_length: DEFAULT_ROOM_CODE_LENGTH,
        }
    }
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(defaults.database_url);

        let max_connections: u32 =
            parse_var(&lookup, "DATABASE_MAX_CONNECTIONS", defaults.max_connections)?;
        if max_connections == 0 {
            return Err(invalid("DATABASE_MAX_CONNECTIONS", "0", "must be at least 1"));
        }

        let max_age_hours: i64 =
            parse_var(&lookup, "ROOM_MAX_AGE_HOURS", DEFAULT_ROOM_MAX_AGE_HOURS)?;
        if !(1..=MAX_ROOM_MAX_AGE_HOURS).contains(&max_age_hours) {
            return Err(invalid(
                "ROOM_MAX_AGE_HOURS",
                &max_age_hours.to_string(),
                &format!("must be between 1 and {}", MAX_ROOM_MAX_AGE_HOURS),
            ));
        }
        let room_max_age = chrono::Duration::try_hours(max_age_hours).ok_or_else(|| {
            invalid(
                "ROOM_MAX_AGE_HOURS",
                &max_age_hours.to_string(),
                "does not fit in a duration",
            )
        })?;

        let sweep_seconds: u64 = parse_var(
            &lookup,
            "SWEEP_INTERVAL_SECONDS",
            DEFAULT_SWEEP_INTERVAL_SECONDS,
        )?;
        if sweep_seconds == 0 {
            return Err(invalid("SWEEP_INTERVAL_SECONDS", "0", "must be at least 1"));
        }

        let room_code_length: usize =
            parse_var(&lookup, "ROOM_CODE_LENGTH", defaults.room_code_length)?;
        if !(MIN_ROOM_CODE_LENGTH..=MAX_ROOM_CODE_LENGTH).contains(&room_code_length) {
            return Err(invalid(
                "ROOM_CODE_LENGTH",
                &room_code_length.to_string(),
                &format!(
                    "must be between {} and {}",
                    MIN_ROOM_CODE_LENGTH, MAX_ROOM_CODE_LENGTH
                ),
            ));
        }

        Ok(Self {
            database_url,
            max_connections,
            room_max_age,
            sweep_interval: Duration::from_secs(sweep_seconds),
            room_code_length,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| invalid(key, &raw, &e.to_string())),
        None => Ok(default),
    }
}

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
