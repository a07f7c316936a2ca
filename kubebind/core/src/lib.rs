//! Core types for the kubebind resource correlator.
//!
//! These are the values that cross the engine's boundary: the
//! [`ResourceEvent`] handed in by the watch layer, the persisted
//! [`MappedResource`] aggregate, and the [`MapResult`] handed back to the
//! caller for persistence.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod event;
mod mapped;
mod result;

pub use self::{
    event::{EventType, Resource, ResourceEvent, ResourceKind, UnknownKind},
    mapped::{KubeMembers, MappedResource},
    result::{MapAction, MapResult},
};
