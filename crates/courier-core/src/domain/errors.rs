//! Error types of the outbox core.
//!
//! Seam-specific errors (`StoreError`, `CommitError`, `PublishError`,
//! `TriggerError`) live next to their ports; `OutboxError` is what the
//! session and the dispatcher hand back to callers.

use thiserror::Error;

use super::ids::OutboxItemId;
use super::item::OutboxStatus;
use crate::ports::{CommitError, StoreError};

/// A state transition was requested from a state that does not allow it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot {action} outbox item {item_id} while it is {from:?}")]
pub struct InvalidTransition {
    pub item_id: OutboxItemId,
    pub from: OutboxStatus,
    pub action: &'static str,
}

#[derive(Debug, Error)]
pub enum OutboxError {
    /// The message could not be turned into a storable payload. Nothing was
    /// staged.
    #[error("message of type {message_type} cannot be serialized: {source}")]
    Serialization {
        message_type: String,
        #[source]
        source: serde_json::Error,
    },

    /// The session already committed; a new session is needed.
    #[error("outbox session has already been committed")]
    AlreadyCommitted,

    /// The unit of work rejected the commit; nothing became visible.
    #[error("commit failed: {0}")]
    Commit(#[from] CommitError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}
