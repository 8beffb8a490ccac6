//! Outbox item: the durable record of a staged message and its delivery state.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::errors::InvalidTransition;
use super::ids::{DispatcherId, OutboxItemId};
use super::message::MessageType;
use super::retry::RetryPolicy;

/// Delivery state of an outbox item.
///
/// Transitions:
/// - Pending -> Dispatching (claim)
/// - Dispatching -> Dispatched (publish succeeded)
/// - Dispatching -> Pending (transient failure below the ceiling, or release)
/// - Dispatching -> Failed (permanent failure, or ceiling reached)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    Pending,
    Dispatching,
    Dispatched,
    Failed,
}

impl OutboxStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OutboxStatus::Dispatched | OutboxStatus::Failed)
    }
}

/// What `record_failure` decided for the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDisposition {
    /// Back to `Pending`, eligible again at `next_attempt_at`.
    Retry { next_attempt_at: DateTime<Utc> },
    /// Moved to `Failed`; excluded from every future claim.
    DeadLettered,
}

/// One row of the outbox table.
///
/// Identity, type and payload are fixed at creation. Delivery state is only
/// changed through the transition methods, which keep these invariants:
/// - `dispatched_at` is set iff `status == Dispatched`
/// - `attempts` never decreases
/// - `claimed_by` / `claimed_at` are set iff `status == Dispatching`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxItem {
    id: OutboxItemId,
    occurred_at: DateTime<Utc>,
    message_type: MessageType,
    payload: serde_json::Value,
    status: OutboxStatus,
    attempts: u32,
    last_error: Option<String>,
    dispatched_at: Option<DateTime<Utc>>,
    next_attempt_at: Option<DateTime<Utc>>,
    claimed_by: Option<DispatcherId>,
    claimed_at: Option<DateTime<Utc>>,
}

impl OutboxItem {
    /// A fresh `Pending` item with no attempts.
    pub fn new(
        id: OutboxItemId,
        occurred_at: DateTime<Utc>,
        message_type: MessageType,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id,
            occurred_at,
            message_type,
            payload,
            status: OutboxStatus::Pending,
            attempts: 0,
            last_error: None,
            dispatched_at: None,
            next_attempt_at: None,
            claimed_by: None,
            claimed_at: None,
        }
    }

    pub fn id(&self) -> OutboxItemId {
        self.id
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn message_type(&self) -> &MessageType {
        &self.message_type
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    pub fn status(&self) -> OutboxStatus {
        self.status
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn dispatched_at(&self) -> Option<DateTime<Utc>> {
        self.dispatched_at
    }

    pub fn next_attempt_at(&self) -> Option<DateTime<Utc>> {
        self.next_attempt_at
    }

    pub fn claimed_by(&self) -> Option<DispatcherId> {
        self.claimed_by
    }

    pub fn claimed_at(&self) -> Option<DateTime<Utc>> {
        self.claimed_at
    }

    /// `Pending` and past its retry delay.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.status == OutboxStatus::Pending && self.next_attempt_at.is_none_or(|at| at <= now)
    }

    /// Pending -> Dispatching.
    pub fn claim(&mut self, by: DispatcherId, now: DateTime<Utc>) -> Result<(), InvalidTransition> {
        if !self.is_eligible(now) {
            return Err(self.invalid("claim"));
        }
        self.status = OutboxStatus::Dispatching;
        self.claimed_by = Some(by);
        self.claimed_at = Some(now);
        Ok(())
    }

    /// Dispatching -> Pending without counting an attempt. Used when a claimed
    /// item was never handed to the publisher.
    pub fn release(&mut self) -> Result<(), InvalidTransition> {
        self.expect_dispatching("release")?;
        self.status = OutboxStatus::Pending;
        self.clear_claim();
        Ok(())
    }

    /// Dispatching -> Dispatched.
    pub fn mark_dispatched(&mut self, now: DateTime<Utc>) -> Result<(), InvalidTransition> {
        self.expect_dispatching("mark_dispatched")?;
        self.attempts = self.attempts.saturating_add(1);
        self.status = OutboxStatus::Dispatched;
        self.dispatched_at = Some(now);
        self.next_attempt_at = None;
        self.clear_claim();
        Ok(())
    }

    /// Dispatching -> Pending (retry) or Failed (dead-letter).
    ///
    /// A permanent failure dead-letters immediately; a transient one only
    /// once the policy's attempt ceiling is reached.
    pub fn record_failure(
        &mut self,
        error: impl Into<String>,
        permanent: bool,
        now: DateTime<Utc>,
        policy: &RetryPolicy,
    ) -> Result<FailureDisposition, InvalidTransition> {
        self.expect_dispatching("record_failure")?;
        self.attempts = self.attempts.saturating_add(1);
        self.last_error = Some(error.into());
        self.clear_claim();

        if permanent || policy.is_exhausted(self.attempts) {
            self.status = OutboxStatus::Failed;
            self.next_attempt_at = None;
            return Ok(FailureDisposition::DeadLettered);
        }

        let delay = TimeDelta::from_std(policy.next_delay(self.attempts)).unwrap_or(TimeDelta::MAX);
        let next_attempt_at = now
            .checked_add_signed(delay)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.status = OutboxStatus::Pending;
        self.next_attempt_at = Some(next_attempt_at);
        Ok(FailureDisposition::Retry { next_attempt_at })
    }

    fn expect_dispatching(&self, action: &'static str) -> Result<(), InvalidTransition> {
        if self.status != OutboxStatus::Dispatching {
            return Err(self.invalid(action));
        }
        Ok(())
    }

    fn clear_claim(&mut self) {
        self.claimed_by = None;
        self.claimed_at = None;
    }

    fn invalid(&self, action: &'static str) -> InvalidTransition {
        InvalidTransition {
            item_id: self.id,
            from: self.status,
            action,
        }
    }
}
