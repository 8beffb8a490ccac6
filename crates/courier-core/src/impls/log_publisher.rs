//! Publisher that only logs. Useful to run the dispatcher without a broker.

use async_trait::async_trait;
use tracing::info;

use crate::ports::{MessagePublisher, OutboundMessage, PublishError};

#[derive(Debug, Clone, Copy, Default)]
pub struct LogPublisher;

#[async_trait]
impl MessagePublisher for LogPublisher {
    async fn publish(&self, message: &OutboundMessage) -> Result<(), PublishError> {
        info!(
            message_id = %message.message_id,
            message_type = %message.message_type,
            occurred_at = %message.occurred_at,
            body = %String::from_utf8_lossy(&message.body),
            "message published"
        );
        Ok(())
    }
}
