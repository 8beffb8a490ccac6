//! DispatcherBuilder - wires an `OutboxDispatcher` and validates it up front.
//!
//! # Fail-fast
//! - every required port must be set
//! - the config must pass `DispatcherConfig::validate`
//! - message types given to `expect_message_types` must all be registered,
//!   otherwise rows of those types would dead-letter at runtime

use std::sync::Arc;

use tracing::{Span, info_span};

use super::config::{ConfigError, DispatcherConfig};
use super::dispatcher::OutboxDispatcher;
use crate::impls::NotifyTrigger;
use crate::ports::{
    Clock, IdGenerator, MessagePublisher, OutboxStore, SystemClock, TriggerListener, UlidGenerator,
};
use crate::typed::MessageRegistry;

/// # Example
/// ```ignore
/// let dispatcher = DispatcherBuilder::new()
///     .store(store)
///     .publisher(publisher)
///     .registry(MessageRegistry::new().with::<OrderCompleted>()?)
///     .trigger(trigger)
///     .expect_message_types(&[OrderCompleted::TYPE])
///     .build()?;
/// ```
#[derive(Default)]
pub struct DispatcherBuilder {
    store: Option<Arc<dyn OutboxStore>>,
    publisher: Option<Arc<dyn MessagePublisher>>,
    registry: Option<MessageRegistry>,
    trigger: Option<Arc<dyn TriggerListener>>,
    clock: Option<Arc<dyn Clock>>,
    config: DispatcherConfig,
    id: Option<crate::domain::DispatcherId>,
    span: Option<Span>,
    expected_types: Option<Vec<String>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("dispatcher is missing its {0}")]
    MissingComponent(&'static str),

    #[error("invalid dispatcher config: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("missing message types: {0:?}. These types were expected but not registered.")]
    MissingMessageTypes(Vec<String>),
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(mut self, store: Arc<dyn OutboxStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn publisher(mut self, publisher: Arc<dyn MessagePublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn registry(mut self, registry: MessageRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Listen on the trigger that `OutboxSession`s notify. Without one the
    /// dispatcher gets a private `NotifyTrigger` and relies on polling alone.
    pub fn trigger(mut self, trigger: Arc<dyn TriggerListener>) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Defaults to `SystemClock`.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Fixed claimer id. Defaults to a fresh ULID.
    pub fn id(mut self, id: crate::domain::DispatcherId) -> Self {
        self.id = Some(id);
        self
    }

    /// Parent span for the dispatcher's logs. Defaults to `outbox_dispatcher`.
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn expect_message_types(mut self, message_types: &[&str]) -> Self {
        self.expected_types = Some(message_types.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn build(self) -> Result<OutboxDispatcher, BuildError> {
        let store = self.store.ok_or(BuildError::MissingComponent("store"))?;
        let publisher = self
            .publisher
            .ok_or(BuildError::MissingComponent("publisher"))?;
        let registry = self
            .registry
            .ok_or(BuildError::MissingComponent("registry"))?;
        self.config.validate()?;

        if let Some(expected) = &self.expected_types {
            let missing: Vec<String> = expected
                .iter()
                .filter(|t| !registry.contains(t))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingMessageTypes(missing));
            }
        }

        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let id = self
            .id
            .unwrap_or_else(|| UlidGenerator::new(Arc::clone(&clock)).generate_dispatcher_id());
        let span = self
            .span
            .unwrap_or_else(|| info_span!("outbox_dispatcher", dispatcher_id = %id));

        Ok(OutboxDispatcher {
            id,
            store,
            publisher,
            registry: Arc::new(registry),
            trigger: self
                .trigger
                .unwrap_or_else(|| Arc::new(NotifyTrigger::new())),
            clock,
            config: self.config,
            span,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OutboxMessage;
    use crate::domain::message::fixtures::{ContactDeleted, OrderCompleted};
    use crate::impls::{InMemoryOutboxStore, LogPublisher};
    use std::time::Duration;

    fn complete() -> DispatcherBuilder {
        DispatcherBuilder::new()
            .store(Arc::new(InMemoryOutboxStore::new()))
            .publisher(Arc::new(LogPublisher))
            .registry(MessageRegistry::new().with::<OrderCompleted>().unwrap())
    }

    #[test]
    fn builds_with_defaults() {
        let dispatcher = complete().build().unwrap();
        assert_eq!(dispatcher.config(), &DispatcherConfig::default());
    }

    #[test]
    fn missing_store_is_rejected() {
        let result = DispatcherBuilder::new()
            .publisher(Arc::new(LogPublisher))
            .registry(MessageRegistry::new())
            .build();
        assert!(matches!(result, Err(BuildError::MissingComponent("store"))));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = DispatcherConfig {
            poll_interval: Duration::ZERO,
            ..DispatcherConfig::default()
        };
        let result = complete().config(config).build();
        assert!(matches!(
            result,
            Err(BuildError::InvalidConfig(ConfigError::ZeroPollInterval))
        ));
    }

    #[test]
    fn unregistered_expected_types_are_reported() {
        let result = complete()
            .expect_message_types(&[OrderCompleted::TYPE, ContactDeleted::TYPE])
            .build();
        assert!(matches!(
            result,
            Err(BuildError::MissingMessageTypes(missing)) if missing == vec![ContactDeleted::TYPE.to_string()]
        ));
    }

    #[test]
    fn explicit_id_is_kept() {
        let id = crate::domain::DispatcherId::from_ulid(ulid::Ulid::new());
        let dispatcher = complete().id(id).build().unwrap();
        assert_eq!(dispatcher.id(), id);
    }
}
