//! Typed message API.
//!
//! - surface: `OutboxMessage` (in `domain`) ties a Rust type to its
//!   `MessageType` string
//! - inside: `DynCodec` erases the type so the registry can hold every codec

pub mod codec;
pub mod registry;

pub use self::codec::{CodecError, DynCodec, TypedCodec};
pub use self::registry::{MessageRegistry, RegistryError};
