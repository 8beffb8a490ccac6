//! Operator-facing views: table counts and per-cycle dispatch reports.

use serde::{Deserialize, Serialize};

/// Rows per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxCounts {
    pub pending: usize,
    pub dispatching: usize,
    pub dispatched: usize,
    pub failed: usize,
}

impl OutboxCounts {
    pub fn total(&self) -> usize {
        self.pending + self.dispatching + self.dispatched + self.failed
    }

    /// Nothing left for a dispatcher to do.
    pub fn is_drained(&self) -> bool {
        self.pending == 0 && self.dispatching == 0
    }
}

/// What one dispatch cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    /// Eligible rows returned by the fetch.
    pub fetched: usize,
    pub claimed: usize,
    /// Claims lost to another instance.
    pub lost_claims: usize,
    pub dispatched: usize,
    pub retried: usize,
    pub dead_lettered: usize,
    /// Claimed rows handed back unpublished (shutdown or stale-claim sweep).
    pub released: usize,
    /// Shutdown was observed mid-batch.
    pub interrupted: bool,
}
