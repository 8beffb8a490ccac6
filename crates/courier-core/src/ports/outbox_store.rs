//! OutboxStore port: the outbox table as seen by the dispatcher.
//!
//! The table is the only resource shared between dispatcher instances. They
//! never coordinate in-process; all they rely on is that `try_claim` is an
//! atomic check-and-set (row lock with skip-locked, a versioned update, or a
//! mutex in the in-memory implementation).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::app::status::OutboxCounts;
use crate::domain::{DispatcherId, OutboxItem, OutboxItemId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("outbox item {0} already exists")]
    DuplicateId(OutboxItemId),

    #[error("outbox item {0} not found")]
    NotFound(OutboxItemId),

    /// The row is no longer claimed by the caller (released as stale and
    /// possibly re-claimed elsewhere). The caller's result is discarded.
    #[error("outbox item {item_id} is not claimed by {claimer}")]
    ClaimLost {
        item_id: OutboxItemId,
        claimer: DispatcherId,
    },

    #[error("outbox backend error: {0}")]
    Backend(String),
}

/// Result of a claim attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    /// The row is now `Dispatching` and owned by the caller.
    Claimed(OutboxItem),
    /// Another instance got there first, or the row stopped being eligible.
    /// Not an error; the item is skipped this cycle.
    Lost,
}

#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Up to `limit` eligible `Pending` rows, oldest `occurred_at` first (ties
    /// in insertion order). Does not lock anything.
    async fn fetch_pending(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<OutboxItem>, StoreError>;

    /// Atomically move one row from eligible `Pending` to `Dispatching`.
    async fn try_claim(
        &self,
        id: OutboxItemId,
        claimer: DispatcherId,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, StoreError>;

    /// Persist the outcome of a publish attempt. The stored row must still be
    /// `Dispatching` under the claimer recorded before the transition.
    async fn record_outcome(
        &self,
        claimer: DispatcherId,
        item: &OutboxItem,
    ) -> Result<(), StoreError>;

    /// Hand a claimed, unpublished row back to `Pending`.
    async fn release(&self, id: OutboxItemId, claimer: DispatcherId) -> Result<(), StoreError>;

    /// Return rows claimed before `claimed_before` to `Pending`. Returns how
    /// many rows were released.
    async fn release_stale_claims(&self, claimed_before: DateTime<Utc>)
    -> Result<usize, StoreError>;

    async fn get(&self, id: OutboxItemId) -> Result<Option<OutboxItem>, StoreError>;

    /// Dead-lettered rows, oldest first.
    async fn list_failed(&self, limit: usize) -> Result<Vec<OutboxItem>, StoreError>;

    async fn counts_by_status(&self) -> Result<OutboxCounts, StoreError>;
}
