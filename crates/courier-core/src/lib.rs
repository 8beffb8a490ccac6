//! courier-core
//!
//! Transactional outbox: messages are written to an outbox table in the same
//! transaction as the business change that produced them, and a dispatcher
//! publishes them afterwards with at-least-once delivery.
//!
//! # Modules
//! - **domain**: ids, `OutboxItem` and its lifecycle, retry policy, errors
//! - **ports**: `OutboxStore`, `UnitOfWork`, `MessagePublisher`, `OutboxTrigger`, `Clock`, `IdGenerator`
//! - **app**: `OutboxSession` (write side), `OutboxDispatcher` (read side), builder, config, status
//! - **typed**: `MessageRegistry` mapping message types to codecs
//! - **impls**: in-memory store, notify trigger, channel and log publishers

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod typed;

pub use app::{
    BuildError, DispatchReport, DispatcherBuilder, DispatcherConfig, DispatcherHandle,
    OutboxCounts, OutboxDispatcher, OutboxItemFactory, OutboxSession,
};
pub use domain::{
    MessageType, OutboxError, OutboxItem, OutboxItemId, OutboxMessage, OutboxStatus, RetryPolicy,
};
