use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Any surrealdb endpoint, e.g. `ws://127.0.0.1:8000` or `mem://`
    pub endpoint: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub namespace: String,
    pub database: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub database: DatabaseConfig,
    pub jwt_secret: String,
    pub session_ttl: Duration,
    pub daily_reward: Decimal,
    pub last_active_interval: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let jwt_secret = lookup("JWT_SECRET")
            .filter(|secret| !secret.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let daily_reward: Decimal = parse("MOKESELL_DAILY_REWARD", get("MOKESELL_DAILY_REWARD", "0.01"))?;
        if daily_reward <= Decimal::ZERO || common::to_minor_units(daily_reward).is_none() {
            return Err(ConfigError::Invalid {
                name: "MOKESELL_DAILY_REWARD",
                value: daily_reward.to_string(),
            });
        }

        let session_hours: u64 = parse(
            "MOKESELL_SESSION_TTL_HOURS",
            get("MOKESELL_SESSION_TTL_HOURS", "24"),
        )?;
        let session_secs = session_hours
            .checked_mul(60 * 60)
            .ok_or_else(|| ConfigError::Invalid {
                name: "MOKESELL_SESSION_TTL_HOURS",
                value: session_hours.to_string(),
            })?;
        let last_active_secs: u64 = parse(
            "MOKESELL_LAST_ACTIVE_INTERVAL_SECS",
            get("MOKESELL_LAST_ACTIVE_INTERVAL_SECS", "300"),
        )?;

        Ok(Self {
            listen_addr: get("MOKESELL_LISTEN_ADDR", "127.0.0.1:6379"),
            database: DatabaseConfig {
                endpoint: get("MOKESELL_DB_ENDPOINT", "ws://127.0.0.1:8000"),
                username: lookup("MOKESELL_DB_USER"),
                password: lookup("MOKESELL_DB_PASS"),
                namespace: get("MOKESELL_DB_NAMESPACE", "mokesell"),
                database: get("MOKESELL_DB_DATABASE", "mokesell"),
            },
            jwt_secret,
            session_ttl: Duration::from_secs(session_secs),
            daily_reward,
            last_active_interval: Duration::from_secs(last_active_secs),
        })
    }
}

fn parse<T: FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}
