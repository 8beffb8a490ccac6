//! Retry policy: decides backoff delays and the attempt ceiling.

use std::time::Duration;

/// Retry policy for failed publish attempts.
///
/// Delay after the n-th attempt: `min(base_delay * multiplier^(n - 1), max_delay)`.
/// With `multiplier >= 1.0` (enforced by `DispatcherConfig::validate`) the
/// delay never shrinks as attempts grow.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay after the first failed attempt.
    pub base_delay: Duration,

    /// Growth factor per additional attempt.
    pub multiplier: f64,

    /// Upper bound for a single delay.
    pub max_delay: Duration,

    /// Attempts after which a transiently failing item is dead-lettered.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(300),
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt, given the number of attempts already
    /// made (1-indexed; `0` is treated like `1`).
    ///
    /// With base 1s, multiplier 2.0: 1s, 2s, 4s, 8s, ... up to `max_delay`.
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64());
        if capped.is_finite() && capped >= 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            self.max_delay
        }
    }

    /// Whether an item with `attempts` failed attempts has hit the ceiling.
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}
