//! Domain model: ids, outbox items, message typing, retry policy, errors.

pub mod errors;
pub mod ids;
pub mod item;
pub mod message;
pub mod retry;

pub use errors::{InvalidTransition, OutboxError};
pub use ids::{DispatcherId, Id, IdMarker, OutboxItemId};
pub use item::{FailureDisposition, OutboxItem, OutboxStatus};
pub use message::{MessageType, OutboxMessage};
pub use retry::RetryPolicy;
