//! ordo-core — shared types, wire format, and configuration.
//! All other Ordo crates depend on this one.

pub mod config;
pub mod unit;
pub mod wire;

pub use unit::{SequenceNumber, Unit};
pub use wire::{TopicId, WireError};
