//! Dispatcher configuration.

use std::time::Duration;

use thiserror::Error;

use crate::domain::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("poll_interval must be greater than zero")]
    ZeroPollInterval,

    #[error("batch_size must be greater than zero")]
    ZeroBatchSize,

    #[error("retry.max_attempts must be greater than zero")]
    ZeroMaxAttempts,

    #[error("retry.multiplier must be a finite number >= 1.0, got {0}")]
    InvalidMultiplier(String),

    #[error("retry.max_delay ({max:?}) is shorter than retry.base_delay ({base:?})")]
    MaxDelayBelowBase { base: Duration, max: Duration },

    #[error("claim_timeout must be greater than zero when set")]
    ZeroClaimTimeout,
}

/// Knobs of the dispatch loop. All of them are explicit; `Default` documents
/// the values used when the caller has no opinion.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherConfig {
    /// Longest wait between cycles when no trigger arrives.
    pub poll_interval: Duration,

    /// Rows fetched and claimed per cycle.
    pub batch_size: usize,

    /// Claims older than this are treated as abandoned by a crashed instance
    /// and returned to `Pending`. `None` disables the sweep.
    pub claim_timeout: Option<Duration>,

    pub retry: RetryPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            batch_size: 50,
            claim_timeout: Some(Duration::from_secs(60)),
            retry: RetryPolicy::default(),
        }
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ZeroMaxAttempts);
        }
        if !self.retry.multiplier.is_finite() || self.retry.multiplier < 1.0 {
            return Err(ConfigError::InvalidMultiplier(
                self.retry.multiplier.to_string(),
            ));
        }
        if self.retry.max_delay < self.retry.base_delay {
            return Err(ConfigError::MaxDelayBelowBase {
                base: self.retry.base_delay,
                max: self.retry.max_delay,
            });
        }
        if self.claim_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::ZeroClaimTimeout);
        }
        Ok(())
    }
}
