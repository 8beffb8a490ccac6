//! Impls: in-process implementations of the ports.
//!
//! - **InMemoryOutboxStore**: outbox table with transactional inserts
//! - **NotifyTrigger**: coalescing wake-up for the dispatcher
//! - **ChannelPublisher** / **LogPublisher**: sinks for tests and demos
//!
//! Database-backed stores and broker publishers live in their own crates.

pub mod channel_publisher;
pub mod inmem_store;
pub mod log_publisher;
pub mod notify_trigger;

pub use self::channel_publisher::ChannelPublisher;
pub use self::inmem_store::{InMemoryOutboxStore, OutboxTransaction};
pub use self::log_publisher::LogPublisher;
pub use self::notify_trigger::NotifyTrigger;
