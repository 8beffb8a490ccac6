#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use courier_core::domain::{DispatcherId, OutboxItem, OutboxItemId};
use courier_core::impls::InMemoryOutboxStore;
use courier_core::ports::{
    ClaimOutcome, CommitError, MessagePublisher, OutboundMessage, OutboxStore, PublishError,
    StoreError, UnitOfWork,
};
use courier_core::{OutboxCounts, OutboxMessage, RetryPolicy};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceIssued {
    pub invoice_id: String,
    pub amount_cents: i64,
}

impl OutboxMessage for InvoiceIssued {
    const TYPE: &'static str = "billing.invoice_issued.v1";
}

pub fn invoice(n: usize) -> InvoiceIssued {
    InvoiceIssued {
        invoice_id: format!("inv-{n}"),
        amount_cents: 1_000 + n as i64,
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, 9, 30, 0).unwrap()
}

/// Retry policy with no real waiting between attempts.
pub fn instant_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        base_delay: Duration::ZERO,
        multiplier: 2.0,
        max_delay: Duration::ZERO,
        max_attempts,
    }
}

/// Replays a script of results, then succeeds (or keeps failing with
/// `fail_forever`). Records every call in order.
#[derive(Default)]
pub struct ScriptedPublisher {
    script: Mutex<VecDeque<PublishError>>,
    fail_forever: Option<PublishError>,
    calls: Mutex<Vec<OutboundMessage>>,
    delivered: Mutex<Vec<OutboundMessage>>,
}

impl ScriptedPublisher {
    pub fn failing_first(errors: impl IntoIterator<Item = PublishError>) -> Self {
        Self {
            script: Mutex::new(errors.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn always_failing(error: PublishError) -> Self {
        Self {
            fail_forever: Some(error),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<OutboundMessage> {
        self.calls.lock().unwrap().clone()
    }

    pub fn delivered(&self) -> Vec<OutboundMessage> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagePublisher for ScriptedPublisher {
    async fn publish(&self, message: &OutboundMessage) -> Result<(), PublishError> {
        self.calls.lock().unwrap().push(message.clone());
        let scripted = self.script.lock().unwrap().pop_front();
        if let Some(err) = scripted.or_else(|| self.fail_forever.clone()) {
            return Err(err);
        }
        self.delivered.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Takes `delay` per publish, then delivers.
pub struct SlowPublisher {
    pub delay: Duration,
    delivered: Mutex<Vec<OutboundMessage>>,
}

impl SlowPublisher {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            delivered: Mutex::default(),
        }
    }

    pub fn delivered(&self) -> Vec<OutboundMessage> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagePublisher for SlowPublisher {
    async fn publish(&self, message: &OutboundMessage) -> Result<(), PublishError> {
        tokio::time::sleep(self.delay).await;
        self.delivered.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Wraps a store and lets a rival instance claim every fetched row between
/// `fetch_pending` and `try_claim`.
pub struct RacingStore {
    pub inner: InMemoryOutboxStore,
    pub rival: DispatcherId,
}

#[async_trait]
impl OutboxStore for RacingStore {
    async fn fetch_pending(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<OutboxItem>, StoreError> {
        let fetched = self.inner.fetch_pending(now, limit).await?;
        for item in &fetched {
            self.inner.try_claim(item.id(), self.rival, now).await?;
        }
        Ok(fetched)
    }

    async fn try_claim(
        &self,
        id: OutboxItemId,
        claimer: DispatcherId,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, StoreError> {
        self.inner.try_claim(id, claimer, now).await
    }

    async fn record_outcome(
        &self,
        claimer: DispatcherId,
        item: &OutboxItem,
    ) -> Result<(), StoreError> {
        self.inner.record_outcome(claimer, item).await
    }

    async fn release(&self, id: OutboxItemId, claimer: DispatcherId) -> Result<(), StoreError> {
        self.inner.release(id, claimer).await
    }

    async fn release_stale_claims(
        &self,
        claimed_before: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        self.inner.release_stale_claims(claimed_before).await
    }

    async fn get(&self, id: OutboxItemId) -> Result<Option<OutboxItem>, StoreError> {
        self.inner.get(id).await
    }

    async fn list_failed(&self, limit: usize) -> Result<Vec<OutboxItem>, StoreError> {
        self.inner.list_failed(limit).await
    }

    async fn counts_by_status(&self) -> Result<OutboxCounts, StoreError> {
        self.inner.counts_by_status().await
    }
}

/// Unit of work over the in-memory store. With `reject` set, the business
/// half fails after the outbox rows were buffered, so the transaction rolls
/// back.
pub struct StoreUnitOfWork {
    pub store: InMemoryOutboxStore,
    pub reject: Option<String>,
}

impl StoreUnitOfWork {
    pub fn new(store: &InMemoryOutboxStore) -> Self {
        Self {
            store: store.clone(),
            reject: None,
        }
    }

    pub fn rejecting(store: &InMemoryOutboxStore, reason: &str) -> Self {
        Self {
            store: store.clone(),
            reject: Some(reason.to_string()),
        }
    }
}

#[async_trait]
impl UnitOfWork for StoreUnitOfWork {
    async fn commit_with_outbox(&mut self, outbox_items: &[OutboxItem]) -> Result<(), CommitError> {
        let mut tx = self.store.begin().await;
        tx.insert(outbox_items)?;
        if let Some(reason) = &self.reject {
            return Err(CommitError::Constraint(reason.clone()));
        }
        tx.commit();
        Ok(())
    }
}

/// Wraps a store whose first `failures` calls to `record_outcome` fail with a
/// backend error before touching the row.
pub struct FlakyOutcomeStore {
    pub inner: InMemoryOutboxStore,
    failures: AtomicUsize,
}

impl FlakyOutcomeStore {
    pub fn new(inner: &InMemoryOutboxStore, failures: usize) -> Self {
        Self {
            inner: inner.clone(),
            failures: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl OutboxStore for FlakyOutcomeStore {
    async fn fetch_pending(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<OutboxItem>, StoreError> {
        self.inner.fetch_pending(now, limit).await
    }

    async fn try_claim(
        &self,
        id: OutboxItemId,
        claimer: DispatcherId,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, StoreError> {
        self.inner.try_claim(id, claimer, now).await
    }

    async fn record_outcome(
        &self,
        claimer: DispatcherId,
        item: &OutboxItem,
    ) -> Result<(), StoreError> {
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Backend("connection reset by peer".into()));
        }
        self.inner.record_outcome(claimer, item).await
    }

    async fn release(&self, id: OutboxItemId, claimer: DispatcherId) -> Result<(), StoreError> {
        self.inner.release(id, claimer).await
    }

    async fn release_stale_claims(
        &self,
        claimed_before: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        self.inner.release_stale_claims(claimed_before).await
    }

    async fn get(&self, id: OutboxItemId) -> Result<Option<OutboxItem>, StoreError> {
        self.inner.get(id).await
    }

    async fn list_failed(&self, limit: usize) -> Result<Vec<OutboxItem>, StoreError> {
        self.inner.list_failed(limit).await
    }

    async fn counts_by_status(&self) -> Result<OutboxCounts, StoreError> {
        self.inner.counts_by_status().await
    }
}
