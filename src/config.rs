use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;
use crate::store::DeadlinePolicy;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub reminder_interval: Duration,
    pub reminder_threshold: Duration,
    pub toast_ttl: Duration,
    pub deadline_policy: DeadlinePolicy,
    pub notify_gateway_url: Option<String>,
    pub notify_dialogs: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://taskbell.db".to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            reminder_interval: Duration::from_secs(60),
            reminder_threshold: Duration::from_secs(3600),
            toast_ttl: Duration::from_secs(3),
            deadline_policy: DeadlinePolicy::AllowPast,
            notify_gateway_url: None,
            notify_dialogs: false,
        }
    }
}

impl AppConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Ok(Self {
            database_url: var("DATABASE_URL").unwrap_or(defaults.database_url),
            bind_addr: parse_or(var("BIND_ADDR"), "BIND_ADDR", defaults.bind_addr)?,
            reminder_interval: secs_or(
                var("REMINDER_INTERVAL_SECS"),
                "REMINDER_INTERVAL_SECS",
                defaults.reminder_interval,
            )?,
            reminder_threshold: secs_or(
                var("REMINDER_THRESHOLD_SECS"),
                "REMINDER_THRESHOLD_SECS",
                defaults.reminder_threshold,
            )?,
            toast_ttl: secs_or(var("TOAST_TTL_SECS"), "TOAST_TTL_SECS", defaults.toast_ttl)?,
            deadline_policy: parse_or(
                var("DEADLINE_POLICY"),
                "DEADLINE_POLICY",
                defaults.deadline_policy,
            )?,
            notify_gateway_url: var("NOTIFY_GATEWAY_URL"),
            notify_dialogs: parse_or(var("NOTIFY_DIALOGS"), "NOTIFY_DIALOGS", defaults.notify_dialogs)?,
        })
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T, AppError> {
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value: {raw}"))),
        None => Ok(default),
    }
}

fn secs_or(raw: Option<String>, key: &str, default: Duration) -> Result<Duration, AppError> {
    let secs: u64 = parse_or(raw, key, default.as_secs())?;
    if secs == 0 {
        return Err(AppError::Config(format!("{key} must be greater than zero")));
    }
    Ok(Duration::from_secs(secs))
}
