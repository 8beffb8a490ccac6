//! Ports: the narrow interfaces the outbox core depends on.
//!
//! - persistence: `OutboxStore` (dispatcher side), `UnitOfWork` (write side)
//! - delivery: `MessagePublisher`, `OutboxTrigger`
//! - determinism: `Clock`, `IdGenerator`

pub mod clock;
pub mod id_generator;
pub mod outbox_store;
pub mod publisher;
pub mod trigger;
pub mod unit_of_work;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::outbox_store::{ClaimOutcome, OutboxStore, StoreError};
pub use self::publisher::{MessagePublisher, OutboundMessage, PublishError};
pub use self::trigger::{OutboxTrigger, TriggerError, TriggerListener};
pub use self::unit_of_work::{CommitError, UnitOfWork};
