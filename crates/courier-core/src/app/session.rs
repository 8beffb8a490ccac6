//! OutboxSession - stages outbox items next to business changes.
//!
//! Wraps any `UnitOfWork`. Business code keeps using the wrapped session
//! through `Deref`/`DerefMut` and adds messages with `stage_message`; one
//! `commit` writes both. After a successful commit the trigger is notified
//! from a separately spawned task, so a slow or failing notification can
//! never reach the caller. Outside a Tokio runtime the notification is
//! skipped and the dispatcher finds the rows on its next poll.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tracing::{Instrument, Span, debug, info_span, warn};

use super::factory::OutboxItemFactory;
use crate::domain::{OutboxError, OutboxItem, OutboxMessage};
use crate::ports::{OutboxTrigger, UnitOfWork};

pub struct OutboxSession<U> {
    inner: U,
    factory: OutboxItemFactory,
    trigger: Arc<dyn OutboxTrigger>,
    staged: Vec<OutboxItem>,
    committed: bool,
    span: Span,
}

impl<U: UnitOfWork> OutboxSession<U> {
    pub fn new(inner: U, factory: OutboxItemFactory, trigger: Arc<dyn OutboxTrigger>) -> Self {
        Self {
            inner,
            factory,
            trigger,
            staged: Vec::new(),
            committed: false,
            span: info_span!("outbox_session"),
        }
    }

    /// Log into `span` instead of the default `outbox_session` span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Convert `message` into an outbox item and add it to this unit of work.
    ///
    /// Nothing is staged if the message does not serialize, or if the session
    /// has already committed.
    pub fn stage_message<M: OutboxMessage>(&mut self, message: &M) -> Result<(), OutboxError> {
        let _entered = self.span.enter();
        if self.committed {
            warn!(message_type = M::TYPE, "stage after commit ignored");
            return Err(OutboxError::AlreadyCommitted);
        }
        let item = self.factory.create(message)?;
        debug!(item_id = %item.id(), message_type = M::TYPE, "message staged");
        self.staged.push(item);
        Ok(())
    }

    pub fn staged(&self) -> &[OutboxItem] {
        &self.staged
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Persist business changes and staged items atomically.
    ///
    /// On failure the error is returned as is and the staged items stay in
    /// the session; nothing became visible. On success the trigger is fired
    /// without waiting for it.
    pub async fn commit(&mut self) -> Result<(), OutboxError> {
        if self.committed {
            return Err(OutboxError::AlreadyCommitted);
        }
        let span = self.span.clone();
        let staged = self.staged.len();

        if let Err(err) = self
            .inner
            .commit_with_outbox(&self.staged)
            .instrument(span.clone())
            .await
        {
            span.in_scope(|| warn!(staged, error = %err, "commit failed"));
            return Err(err.into());
        }

        self.committed = true;
        self.staged.clear();
        span.in_scope(|| debug!(staged, "commit succeeded"));

        if staged > 0 {
            self.fire_trigger();
        }
        Ok(())
    }

    fn fire_trigger(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            self.span
                .in_scope(|| debug!("no async runtime; trigger skipped, dispatcher will poll"));
            return;
        };
        let trigger = Arc::clone(&self.trigger);
        runtime.spawn(
            async move {
                if let Err(err) = trigger.notify().await {
                    debug!(error = %err, "trigger notification lost; dispatcher will poll");
                }
            }
            .instrument(self.span.clone()),
        );
    }

    /// The wrapped unit of work.
    pub fn into_inner(self) -> U {
        self.inner
    }
}

impl<U> Deref for OutboxSession<U> {
    type Target = U;

    fn deref(&self) -> &U {
        &self.inner
    }
}

impl<U> DerefMut for OutboxSession<U> {
    fn deref_mut(&mut self) -> &mut U {
        &mut self.inner
    }
}
