//! App layer: combines the ports into the two halves of the outbox.
//!
//! # Components
//! - **OutboxSession**: write side, stages messages next to business changes
//! - **OutboxDispatcher**: read side, claim -> publish -> record loop
//! - **DispatcherBuilder**: wiring with start-up validation
//! - **status**: counts and per-cycle reports

pub mod builder;
pub mod config;
pub mod dispatcher;
pub mod factory;
pub mod session;
pub mod status;

pub use self::builder::{BuildError, DispatcherBuilder};
pub use self::config::{ConfigError, DispatcherConfig};
pub use self::dispatcher::{DispatcherHandle, OutboxDispatcher};
pub use self::factory::OutboxItemFactory;
pub use self::session::OutboxSession;
pub use self::status::{DispatchReport, OutboxCounts};
