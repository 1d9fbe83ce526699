//! Process configuration read from the environment.

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    /// Selects the Postgres store when set.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    pub run_migrations: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5000,
            database_url: None,
            db_max_connections: 8,
            db_acquire_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: string_env("FORUM_HOST").unwrap_or(defaults.host),
            port: parse_env("FORUM_PORT", defaults.port),
            database_url: string_env("DATABASE_URL"),
            db_max_connections: parse_env("DB_MAX_CONNECTIONS", defaults.db_max_connections),
            db_acquire_timeout: Duration::from_secs(parse_env(
                "DB_ACQUIRE_TIMEOUT_SECS",
                defaults.db_acquire_timeout.as_secs(),
            )),
            run_migrations: parse_env("RUN_MIGRATIONS", defaults.run_migrations),
        }
    }

    pub fn bind_addr(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }
}

fn string_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Unset means `default`; an unparsable value is reported and ignored.
fn parse_env<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match string_env(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value '{raw}' ({e}), using default: {default}");
            default
        }),
    }
}
