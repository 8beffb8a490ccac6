//! In-memory outbox table.
//!
//! One `tokio::sync::Mutex` guards every row, which makes `try_claim` a plain
//! check-and-set. Writers that need business rows and outbox rows to land
//! together hold an `OutboxTransaction`: the lock is taken for its whole
//! lifetime, inserts are buffered, and only `commit` makes them visible.
//! Dropping the transaction discards the buffer.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::app::status::OutboxCounts;
use crate::domain::{DispatcherId, OutboxItem, OutboxItemId, OutboxStatus};
use crate::ports::{ClaimOutcome, OutboxStore, StoreError};

struct Row {
    /// Insertion order, used to break `occurred_at` ties.
    seq: u64,
    item: OutboxItem,
}

#[derive(Default)]
struct StoreState {
    rows: HashMap<OutboxItemId, Row>,
    next_seq: u64,
}

impl StoreState {
    fn claimed_row(
        &mut self,
        id: OutboxItemId,
        claimer: DispatcherId,
    ) -> Result<&mut Row, StoreError> {
        let row = self.rows.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if row.item.status() != OutboxStatus::Dispatching || row.item.claimed_by() != Some(claimer)
        {
            return Err(StoreError::ClaimLost {
                item_id: id,
                claimer,
            });
        }
        Ok(row)
    }

    fn sorted<'a>(rows: impl Iterator<Item = &'a Row>, limit: usize) -> Vec<OutboxItem> {
        let mut rows: Vec<&Row> = rows.collect();
        rows.sort_by_key(|row| (row.item.occurred_at(), row.seq));
        rows.into_iter()
            .take(limit)
            .map(|row| row.item.clone())
            .collect()
    }
}

/// Cloning shares the same table.
#[derive(Clone, Default)]
pub struct InMemoryOutboxStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryOutboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an atomic write. Blocks other writers and the dispatcher until
    /// the transaction is committed or dropped.
    pub async fn begin(&self) -> OutboxTransaction {
        OutboxTransaction {
            state: Arc::clone(&self.state).lock_owned().await,
            buffered: Vec::new(),
        }
    }

    /// Insert items in one transaction.
    pub async fn insert_all(&self, items: Vec<OutboxItem>) -> Result<(), StoreError> {
        let mut tx = self.begin().await;
        tx.insert(&items)?;
        tx.commit();
        Ok(())
    }
}

/// Buffered inserts plus the table lock. See the module docs.
pub struct OutboxTransaction {
    state: OwnedMutexGuard<StoreState>,
    buffered: Vec<OutboxItem>,
}

impl OutboxTransaction {
    /// Buffer `items`. A duplicate id (already stored or already buffered)
    /// rejects the whole call and buffers nothing from it.
    pub fn insert(&mut self, items: &[OutboxItem]) -> Result<(), StoreError> {
        for (i, item) in items.iter().enumerate() {
            let id = item.id();
            let seen = self.state.rows.contains_key(&id)
                || self.buffered.iter().any(|b| b.id() == id)
                || items[..i].iter().any(|b| b.id() == id);
            if seen {
                return Err(StoreError::DuplicateId(id));
            }
        }
        self.buffered.extend_from_slice(items);
        Ok(())
    }

    pub fn buffered(&self) -> &[OutboxItem] {
        &self.buffered
    }

    /// Make buffered rows visible and release the lock.
    pub fn commit(mut self) {
        let buffered = std::mem::take(&mut self.buffered);
        let state = &mut *self.state;
        for item in buffered {
            let seq = state.next_seq;
            state.next_seq += 1;
            state.rows.insert(item.id(), Row { seq, item });
        }
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutboxStore {
    async fn fetch_pending(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<OutboxItem>, StoreError> {
        let state = self.state.lock().await;
        Ok(StoreState::sorted(
            state.rows.values().filter(|row| row.item.is_eligible(now)),
            limit,
        ))
    }

    async fn try_claim(
        &self,
        id: OutboxItemId,
        claimer: DispatcherId,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, StoreError> {
        let mut state = self.state.lock().await;
        let row = state.rows.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if row.item.claim(claimer, now).is_err() {
            return Ok(ClaimOutcome::Lost);
        }
        Ok(ClaimOutcome::Claimed(row.item.clone()))
    }

    async fn record_outcome(
        &self,
        claimer: DispatcherId,
        item: &OutboxItem,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let row = state.claimed_row(item.id(), claimer)?;
        row.item = item.clone();
        Ok(())
    }

    async fn release(&self, id: OutboxItemId, claimer: DispatcherId) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let row = state.claimed_row(id, claimer)?;
        row.item
            .release()
            .map_err(|err| StoreError::Backend(err.to_string()))
    }

    async fn release_stale_claims(
        &self,
        claimed_before: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let mut state = self.state.lock().await;
        let mut released = 0;
        for row in state.rows.values_mut() {
            let stale = row.item.status() == OutboxStatus::Dispatching
                && row.item.claimed_at().is_none_or(|at| at < claimed_before);
            if stale && row.item.release().is_ok() {
                released += 1;
            }
        }
        Ok(released)
    }

    async fn get(&self, id: OutboxItemId) -> Result<Option<OutboxItem>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.rows.get(&id).map(|row| row.item.clone()))
    }

    async fn list_failed(&self, limit: usize) -> Result<Vec<OutboxItem>, StoreError> {
        let state = self.state.lock().await;
        Ok(StoreState::sorted(
            state
                .rows
                .values()
                .filter(|row| row.item.status() == OutboxStatus::Failed),
            limit,
        ))
    }

    async fn counts_by_status(&self) -> Result<OutboxCounts, StoreError> {
        let state = self.state.lock().await;
        let mut counts = OutboxCounts::default();
        for row in state.rows.values() {
            match row.item.status() {
                OutboxStatus::Pending => counts.pending += 1,
                OutboxStatus::Dispatching => counts.dispatching += 1,
                OutboxStatus::Dispatched => counts.dispatched += 1,
                OutboxStatus::Failed => counts.failed += 1,
            }
        }
        Ok(counts)
    }
}
