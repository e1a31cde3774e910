//! Sequenced units — the atomic item being reordered.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Position of a unit within one sender's stream.
///
/// Numbering is 1-based. Zero is never assigned by a sequencer, but a peer
/// may still put it on the wire; the reorder buffer treats it as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceNumber(u32);

impl SequenceNumber {
    /// The first sequence number of every stream.
    pub const FIRST: SequenceNumber = SequenceNumber(1);

    /// The last representable sequence number. Nothing follows it.
    pub const LAST: SequenceNumber = SequenceNumber(u32::MAX);

    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    /// The following sequence number, or `None` at `u32::MAX`.
    /// Streams do not wrap.
    pub fn checked_next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl From<u32> for SequenceNumber {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<SequenceNumber> for u32 {
    fn from(seq: SequenceNumber) -> u32 {
        seq.0
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One payload plus its assigned sequence number.
///
/// Immutable once built. `Bytes` keeps clones and slices cheap as the unit
/// moves from sequencer to transport and from reorder buffer to consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    sequence: SequenceNumber,
    payload: Bytes,
}

impl Unit {
    pub fn new(sequence: SequenceNumber, payload: impl Into<Bytes>) -> Self {
        Self {
            sequence,
            payload: payload.into(),
        }
    }

    pub fn sequence(&self) -> SequenceNumber {
        self.sequence
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Consume the unit, keeping only the payload.
    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}
