//! Publisher that forwards messages into a tokio mpsc channel.
//!
//! Stands in for a broker in tests and demos; the receiving half plays the
//! consumer.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::ports::{MessagePublisher, OutboundMessage, PublishError};

#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: mpsc::Sender<OutboundMessage>,
}

impl ChannelPublisher {
    pub fn new(tx: mpsc::Sender<OutboundMessage>) -> Self {
        Self { tx }
    }

    /// A publisher and the consumer end of a channel holding `capacity`
    /// messages.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl MessagePublisher for ChannelPublisher {
    async fn publish(&self, message: &OutboundMessage) -> Result<(), PublishError> {
        // A consumer that went away may come back; retry rather than dead-letter.
        self.tx
            .send(message.clone())
            .await
            .map_err(|_| PublishError::Transient("consumer channel closed".to_string()))
    }
}
