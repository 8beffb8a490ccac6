//! Dispatcher settings from `COURIER_*` environment variables.
//!
//! Unset variables keep the `DispatcherConfig` defaults. A set but unparsable
//! value is an error rather than a silent fallback.

use std::str::FromStr;
use std::time::Duration;

use courier_core::DispatcherConfig;
use thiserror::Error;

pub const POLL_INTERVAL_MS: &str = "COURIER_POLL_INTERVAL_MS";
pub const BATCH_SIZE: &str = "COURIER_BATCH_SIZE";
pub const MAX_ATTEMPTS: &str = "COURIER_MAX_ATTEMPTS";
pub const BACKOFF_BASE_MS: &str = "COURIER_BACKOFF_BASE_MS";
pub const BACKOFF_MULTIPLIER: &str = "COURIER_BACKOFF_MULTIPLIER";
pub const BACKOFF_MAX_MS: &str = "COURIER_BACKOFF_MAX_MS";
/// `0` disables stale-claim recovery.
pub const CLAIM_TIMEOUT_MS: &str = "COURIER_CLAIM_TIMEOUT_MS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvConfigError {
    #[error("{key}={value:?} is not a valid value: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Load `.env` (if present) and read the process environment.
pub fn from_env() -> Result<DispatcherConfig, EnvConfigError> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Build a config from any key lookup, starting from the defaults.
pub fn from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<DispatcherConfig, EnvConfigError> {
    let mut config = DispatcherConfig::default();

    if let Some(ms) = parse::<u64>(&lookup, POLL_INTERVAL_MS)? {
        config.poll_interval = Duration::from_millis(ms);
    }
    if let Some(n) = parse::<usize>(&lookup, BATCH_SIZE)? {
        config.batch_size = n;
    }
    if let Some(n) = parse::<u32>(&lookup, MAX_ATTEMPTS)? {
        config.retry.max_attempts = n;
    }
    if let Some(ms) = parse::<u64>(&lookup, BACKOFF_BASE_MS)? {
        config.retry.base_delay = Duration::from_millis(ms);
    }
    if let Some(m) = parse::<f64>(&lookup, BACKOFF_MULTIPLIER)? {
        config.retry.multiplier = m;
    }
    if let Some(ms) = parse::<u64>(&lookup, BACKOFF_MAX_MS)? {
        config.retry.max_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = parse::<u64>(&lookup, CLAIM_TIMEOUT_MS)? {
        config.claim_timeout = (ms > 0).then(|| Duration::from_millis(ms));
    }

    Ok(config)
}

fn parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, EnvConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse()
        .map(Some)
        .map_err(|err: T::Err| EnvConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: err.to_string(),
        })
}
