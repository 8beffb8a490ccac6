//! UnitOfWork port: the business persistence session the outbox decorates.

use async_trait::async_trait;
use thiserror::Error;

use super::StoreError;
use crate::domain::OutboxItem;

#[derive(Debug, Error)]
pub enum CommitError {
    /// Optimistic concurrency check failed on a business row.
    #[error("concurrent modification: {0}")]
    Conflict(String),

    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("backend error: {0}")]
    Backend(String),
}

/// A scope whose tracked changes are committed together or not at all.
///
/// Implementations must write `outbox_items` in the same transaction as the
/// business changes: after `Ok` both are visible, after `Err` neither is.
/// Dropping the returned future before it resolves must leave nothing
/// visible either.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn commit_with_outbox(&mut self, outbox_items: &[OutboxItem]) -> Result<(), CommitError>;
}
