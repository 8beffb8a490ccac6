//! OutboxTrigger port: a hint that new outbox rows may exist.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("trigger notification not delivered: {0}")]
pub struct TriggerError(pub String);

/// Coalescing wake-up signal, not a delivery channel.
///
/// Many notifications before the dispatcher wakes collapse into one wake-up.
/// Losing a notification only costs latency; dispatchers poll regardless.
#[async_trait]
pub trait OutboxTrigger: Send + Sync {
    async fn notify(&self) -> Result<(), TriggerError>;
}

/// Receiving half of a trigger, as seen by the dispatcher.
///
/// `notified` completes on the next notification, or right away if one
/// arrived since the last wake-up.
#[async_trait]
pub trait TriggerListener: Send + Sync {
    async fn notified(&self);
}
