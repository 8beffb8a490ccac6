//! Message typing: the closed, tagged representation of staged messages.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminator stored next to every payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageType(String);

impl MessageType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for MessageType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A domain message that can be staged in the outbox.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct OrderCompleted {
///     order_id: String,
/// }
///
/// impl OutboxMessage for OrderCompleted {
///     const TYPE: &'static str = "orders.order_completed.v1";
/// }
/// ```
///
/// Naming convention for `TYPE`: `{domain}.{event}.v{major}`. The string is
/// persisted, so renaming a type orphans rows already in the table.
pub trait OutboxMessage: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TYPE: &'static str;

    fn message_type() -> MessageType {
        MessageType::new(Self::TYPE)
    }
}
