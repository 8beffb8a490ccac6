//! IdGenerator port.
//!
//! `UlidGenerator` takes the time component from the injected clock, so ids
//! created under a `FixedClock` carry the fixed timestamp.

use ulid::Ulid;

use crate::domain::ids::{DispatcherId, OutboxItemId};
use crate::ports::Clock;

pub trait IdGenerator: Send + Sync {
    fn generate_item_id(&self) -> OutboxItemId;

    fn generate_dispatcher_id(&self) -> DispatcherId;
}

pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_item_id(&self) -> OutboxItemId {
        OutboxItemId::from(self.next_ulid())
    }

    fn generate_dispatcher_id(&self) -> DispatcherId {
        DispatcherId::from(self.next_ulid())
    }
}
