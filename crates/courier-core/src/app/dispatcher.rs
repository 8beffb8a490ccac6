//! OutboxDispatcher - claims pending items, publishes them, records outcomes.
//!
//! # Cycle
//! 1. (optional) return stale claims of crashed instances to `Pending`
//! 2. `fetch_pending` eligible rows, oldest first
//! 3. `try_claim` each one; lost claims are skipped
//! 4. for each claimed row, in `occurred_at` order: decode via the registry,
//!    publish, record `Dispatched` / retry / dead-letter
//!
//! Between cycles the loop waits for a trigger wake-up or the poll interval,
//! whichever comes first. A full batch starts the next cycle right away.
//!
//! Shutdown is checked before every cycle and before every publish. Rows
//! claimed but not yet published when shutdown arrives are released, and so
//! is a row whose outcome could not be recorded. Neither stays in
//! `Dispatching`.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, Span, debug, error, info, warn};

use super::config::DispatcherConfig;
use super::status::DispatchReport;
use crate::domain::{DispatcherId, FailureDisposition, OutboxError, OutboxItem};
use crate::ports::{
    ClaimOutcome, Clock, MessagePublisher, OutboundMessage, OutboxStore, PublishError, StoreError,
    TriggerListener,
};
use crate::typed::MessageRegistry;

pub struct OutboxDispatcher {
    pub(super) id: DispatcherId,
    pub(super) store: Arc<dyn OutboxStore>,
    pub(super) publisher: Arc<dyn MessagePublisher>,
    pub(super) registry: Arc<MessageRegistry>,
    pub(super) trigger: Arc<dyn TriggerListener>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) config: DispatcherConfig,
    pub(super) span: Span,
}

impl OutboxDispatcher {
    pub fn id(&self) -> DispatcherId {
        self.id
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Run cycles until `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let span = self.span.clone();
        async {
            info!(dispatcher_id = %self.id, "dispatcher started");
            loop {
                if *shutdown.borrow() {
                    break;
                }

                let report = match self.run_once(&shutdown).await {
                    Ok(report) => report,
                    Err(err) => {
                        error!(error = %err, "dispatch cycle failed");
                        DispatchReport::default()
                    }
                };
                if report.interrupted {
                    break;
                }
                if report.fetched >= self.config.batch_size {
                    // Probably more eligible rows behind this batch.
                    continue;
                }

                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = self.trigger.notified() => {
                        debug!("woken by trigger");
                    }
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                }
            }
            info!(dispatcher_id = %self.id, "dispatcher stopped");
        }
        .instrument(span)
        .await
    }

    /// Run a single claim-publish-record cycle.
    pub async fn run_once(
        &self,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<DispatchReport, OutboxError> {
        let mut report = DispatchReport::default();
        let now = self.clock.now();

        if let Some(timeout) = self.config.claim_timeout {
            let cutoff = TimeDelta::from_std(timeout)
                .ok()
                .and_then(|timeout| now.checked_sub_signed(timeout))
                .unwrap_or(DateTime::<Utc>::MIN_UTC);
            let released = self.store.release_stale_claims(cutoff).await?;
            if released > 0 {
                warn!(released, "released stale claims");
                report.released += released;
            }
        }

        let candidates = self.store.fetch_pending(now, self.config.batch_size).await?;
        report.fetched = candidates.len();

        let mut claimed = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match self.store.try_claim(candidate.id(), self.id, now).await {
                Ok(ClaimOutcome::Claimed(item)) => claimed.push(item),
                Ok(ClaimOutcome::Lost) => {
                    debug!(item_id = %candidate.id(), "claim lost to another dispatcher");
                    report.lost_claims += 1;
                }
                Err(err) => {
                    report.released += self.release_all(claimed).await;
                    return Err(err.into());
                }
            }
        }
        report.claimed = claimed.len();

        // Stable: rows with equal timestamps keep the store's order.
        claimed.sort_by_key(OutboxItem::occurred_at);

        let mut remaining = claimed.into_iter();
        while let Some(item) = remaining.next() {
            if *shutdown.borrow() {
                report.interrupted = true;
                report.released += self.release_all(std::iter::once(item).chain(remaining)).await;
                break;
            }
            self.dispatch_item(item, &mut report).await;
        }

        if report.fetched > 0 {
            debug!(?report, "dispatch cycle finished");
        }
        Ok(report)
    }

    async fn dispatch_item(&self, mut item: OutboxItem, report: &mut DispatchReport) {
        let result = self.publish(&item).await;
        let now = self.clock.now();

        let transition = match &result {
            Ok(()) => item.mark_dispatched(now).map(|()| {
                info!(item_id = %item.id(), message_type = %item.message_type(), attempts = item.attempts(), "message dispatched");
                report.dispatched += 1;
            }),
            Err(err) => item
                .record_failure(err.to_string(), err.is_permanent(), now, &self.config.retry)
                .map(|disposition| match disposition {
                    FailureDisposition::Retry { next_attempt_at } => {
                        warn!(item_id = %item.id(), attempts = item.attempts(), %next_attempt_at, error = %err, "publish failed; retry scheduled");
                        report.retried += 1;
                    }
                    FailureDisposition::DeadLettered => {
                        error!(item_id = %item.id(), message_type = %item.message_type(), attempts = item.attempts(), error = %err, "message dead-lettered");
                        report.dead_lettered += 1;
                    }
                }),
        };
        if let Err(err) = transition {
            error!(error = %err, "claimed item in unexpected state");
            return;
        }

        match self.store.record_outcome(self.id, &item).await {
            Ok(()) => {}
            Err(StoreError::ClaimLost { .. }) => {
                warn!(item_id = %item.id(), "claim expired before the outcome was recorded; item will be redelivered");
            }
            Err(err) => {
                // The outcome is lost; hand the row back so it is redelivered.
                error!(item_id = %item.id(), error = %err, "failed to record outcome; releasing claim");
                if self.release_all(std::iter::once(item)).await > 0 {
                    report.released += 1;
                }
            }
        }
    }

    async fn publish(&self, item: &OutboxItem) -> Result<(), PublishError> {
        let body = self
            .registry
            .to_wire(item.message_type(), item.payload())
            .map_err(|err| PublishError::Permanent(err.to_string()))?;
        let message = OutboundMessage {
            message_id: item.id(),
            message_type: item.message_type().clone(),
            occurred_at: item.occurred_at(),
            body,
        };
        self.publisher.publish(&message).await
    }

    async fn release_all(&self, items: impl IntoIterator<Item = OutboxItem>) -> usize {
        let mut released = 0;
        for item in items {
            match self.store.release(item.id(), self.id).await {
                Ok(()) => released += 1,
                Err(err) => {
                    warn!(item_id = %item.id(), error = %err, "could not release claim");
                }
            }
        }
        released
    }

    /// Run the loop on a background task.
    pub fn spawn(self) -> DispatcherHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let dispatcher = Arc::new(self);
        let join = tokio::spawn({
            let dispatcher = Arc::clone(&dispatcher);
            async move { dispatcher.run(shutdown_rx).await }
        });
        DispatcherHandle {
            id: dispatcher.id,
            shutdown_tx,
            join,
        }
    }
}

/// Handle to a spawned dispatcher.
/// - `request_shutdown` lets the in-flight publish finish, releases the rest
///   of the batch, then exits
/// - dropping the handle also stops the loop (the shutdown sender closes)
pub struct DispatcherHandle {
    id: DispatcherId,
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl DispatcherHandle {
    pub fn id(&self) -> DispatcherId {
        self.id
    }

    pub fn request_shutdown(&self) {
        // The loop may already be gone.
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        if let Err(err) = self.join.await {
            error!(dispatcher_id = %self.id, error = %err, "dispatcher task panicked");
        }
    }
}
