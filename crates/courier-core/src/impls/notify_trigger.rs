//! In-process trigger backed by `tokio::sync::Notify`.
//!
//! `notify_one` stores at most one permit, so any number of notifications
//! sent while the dispatcher is busy wake it exactly once.

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::ports::{OutboxTrigger, TriggerError, TriggerListener};

#[derive(Debug, Default)]
pub struct NotifyTrigger {
    notify: Notify,
}

impl NotifyTrigger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OutboxTrigger for NotifyTrigger {
    async fn notify(&self) -> Result<(), TriggerError> {
        self.notify.notify_one();
        Ok(())
    }
}

#[async_trait]
impl TriggerListener for NotifyTrigger {
    async fn notified(&self) {
        self.notify.notified().await;
    }
}
