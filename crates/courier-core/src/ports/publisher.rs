//! MessagePublisher port: the sink (broker, webhook, queue) behind the
//! dispatcher.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{MessageType, OutboxItemId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// Worth retrying (timeouts, broker unavailable, throttling).
    #[error("transient publish failure: {0}")]
    Transient(String),

    /// Retrying cannot help (rejected message, unknown type, bad payload).
    #[error("permanent publish failure: {0}")]
    Permanent(String),
}

impl PublishError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, PublishError::Permanent(_))
    }
}

/// A message ready for the wire.
///
/// `message_id` is stable across redeliveries; consumers use it to
/// deduplicate.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub message_id: OutboxItemId,
    pub message_type: MessageType,
    pub occurred_at: DateTime<Utc>,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn publish(&self, message: &OutboundMessage) -> Result<(), PublishError>;
}
