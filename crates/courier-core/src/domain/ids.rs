//! Strongly-typed identifiers.
//!
//! All ids are ULIDs wrapped in a generic `Id<T>`. The marker `T` only exists
//! at compile time, so an `OutboxItemId` can never be passed where a
//! `DispatcherId` is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// Marker trait supplying the `Display` prefix of an id type.
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutboxItemMarker {}

impl IdMarker for OutboxItemMarker {
    fn prefix() -> &'static str {
        "outbox-"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DispatcherMarker {}

impl IdMarker for DispatcherMarker {
    fn prefix() -> &'static str {
        "dispatcher-"
    }
}

/// Identifier of a stored outbox row. Also serves as the idempotency key
/// handed to consumers.
pub type OutboxItemId = Id<OutboxItemMarker>;

/// Identifier of one dispatcher instance; recorded on the rows it claims.
pub type DispatcherId = Id<DispatcherMarker>;
