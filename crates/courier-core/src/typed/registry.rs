//! MessageRegistry: the explicit `MessageType -> codec` table.
//!
//! Built once at start-up (mutable), then shared read-only behind an `Arc`.
//! The dispatcher never inspects payloads any other way.

use std::collections::HashMap;
use std::sync::Arc;

use super::codec::{CodecError, DynCodec, TypedCodec};
use crate::domain::{MessageType, OutboxMessage};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("message type '{0}' is already registered")]
    AlreadyRegistered(String),
}

#[derive(Default)]
pub struct MessageRegistry {
    codecs: HashMap<String, Arc<dyn DynCodec>>,
}

impl MessageRegistry {
    pub fn new() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    pub fn register<M: OutboxMessage>(&mut self) -> Result<(), RegistryError> {
        let message_type = M::TYPE.to_string();
        if self.codecs.contains_key(&message_type) {
            return Err(RegistryError::AlreadyRegistered(message_type));
        }
        self.codecs
            .insert(message_type, Arc::new(TypedCodec::<M>::new()));
        Ok(())
    }

    /// Builder-style `register`.
    pub fn with<M: OutboxMessage>(mut self) -> Result<Self, RegistryError> {
        self.register::<M>()?;
        Ok(self)
    }

    pub fn get(&self, message_type: &MessageType) -> Option<Arc<dyn DynCodec>> {
        self.codecs.get(message_type.as_str()).cloned()
    }

    pub fn contains(&self, message_type: &str) -> bool {
        self.codecs.contains_key(message_type)
    }

    /// Registered types, sorted.
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.codecs.keys().cloned().collect();
        types.sort();
        types
    }

    /// Decode a stored payload through its codec and produce the wire body.
    pub fn to_wire(
        &self,
        message_type: &MessageType,
        payload: &serde_json::Value,
    ) -> Result<Vec<u8>, CodecError> {
        let codec = self
            .get(message_type)
            .ok_or_else(|| CodecError::UnknownType(message_type.clone()))?;
        codec.to_wire(payload)
    }
}
