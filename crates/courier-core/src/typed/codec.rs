//! Codecs: per-type decoding of stored payloads into wire bodies.
//!
//! `TypedCodec<M>` knows the concrete message type; `DynCodec` erases it so
//! codecs for different types can share one map.

use std::marker::PhantomData;

use thiserror::Error;

use crate::domain::{MessageType, OutboxMessage};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("no codec registered for message type '{0}'")]
    UnknownType(MessageType),

    #[error("payload of '{message_type}' does not decode: {source}")]
    Decode {
        message_type: MessageType,
        #[source]
        source: serde_json::Error,
    },

    #[error("message of type '{message_type}' does not encode: {source}")]
    Encode {
        message_type: MessageType,
        #[source]
        source: serde_json::Error,
    },
}

/// Object-safe codec, stored as `Arc<dyn DynCodec>` in the registry.
pub trait DynCodec: Send + Sync {
    /// Decode `payload` into the registered message type and encode it as the
    /// JSON wire body.
    fn to_wire(&self, payload: &serde_json::Value) -> Result<Vec<u8>, CodecError>;

    fn message_type(&self) -> &'static str;
}

pub struct TypedCodec<M: OutboxMessage> {
    _marker: PhantomData<fn() -> M>,
}

impl<M: OutboxMessage> TypedCodec<M> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<M: OutboxMessage> Default for TypedCodec<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: OutboxMessage> DynCodec for TypedCodec<M> {
    fn to_wire(&self, payload: &serde_json::Value) -> Result<Vec<u8>, CodecError> {
        let message: M =
            serde_json::from_value(payload.clone()).map_err(|source| CodecError::Decode {
                message_type: M::message_type(),
                source,
            })?;
        serde_json::to_vec(&message).map_err(|source| CodecError::Encode {
            message_type: M::message_type(),
            source,
        })
    }

    fn message_type(&self) -> &'static str {
        M::TYPE
    }
}
