//! OutboxItemFactory: domain message -> `Pending` outbox item. No I/O.

use std::sync::Arc;

use crate::domain::{OutboxError, OutboxItem, OutboxMessage};
use crate::ports::{Clock, IdGenerator, SystemClock, UlidGenerator};

#[derive(Clone)]
pub struct OutboxItemFactory {
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl OutboxItemFactory {
    pub fn new(ids: Arc<dyn IdGenerator>, clock: Arc<dyn Clock>) -> Self {
        Self { ids, clock }
    }

    /// ULID ids and `occurred_at` both taken from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let ids = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        Self::new(ids, clock)
    }

    pub fn system() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Serialize `message` into a new item stamped with the current time.
    ///
    /// Fails with `OutboxError::Serialization` if the message has no JSON
    /// representation; no item is produced in that case.
    pub fn create<M: OutboxMessage>(&self, message: &M) -> Result<OutboxItem, OutboxError> {
        let payload =
            serde_json::to_value(message).map_err(|source| OutboxError::Serialization {
                message_type: M::TYPE.to_string(),
                source,
            })?;
        Ok(OutboxItem::new(
            self.ids.generate_item_id(),
            self.clock.now(),
            M::message_type(),
            payload,
        ))
    }
}
