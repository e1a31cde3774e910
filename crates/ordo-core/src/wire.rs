//! Ordo wire format — what a unit looks like inside a transport message.
//!
//! Every pub/sub message carried for Ordo is a 4-byte big-endian sequence
//! number followed by the opaque payload. There is no length field, no
//! version byte, no checksum: the transport frames messages for us and
//! integrity is its concern. Changing this layout breaks every peer.
//!
//! The header uses zerocopy derives with an explicit big-endian field type,
//! so the layout is identical on every host and there is no unsafe code here.

use bytes::{Bytes, BytesMut};
use static_assertions::assert_eq_size;
use zerocopy::byteorder::{BigEndian, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

use crate::unit::{SequenceNumber, Unit};

// ── Unit Header ──────────────────────────────────────────────────────────────

/// Prefix of every Ordo message.
///
/// Wire size: 4 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct UnitHeader {
    /// Sender-assigned sequence number, big-endian.
    pub sequence: U32<BigEndian>,
}

// Compile-time size guard. If this fails, the wire format has silently changed.
assert_eq_size!(UnitHeader, [u8; 4]);

/// Length of the sequence-number prefix.
pub const HEADER_LEN: usize = 4;

impl UnitHeader {
    pub fn new(sequence: SequenceNumber) -> Self {
        Self {
            sequence: U32::new(sequence.get()),
        }
    }

    pub fn sequence(&self) -> SequenceNumber {
        SequenceNumber::new(self.sequence.get())
    }
}

// ── Encoding ─────────────────────────────────────────────────────────────────

/// Marshal a unit into a transport message: header then payload.
pub fn encode(unit: &Unit) -> Bytes {
    let header = UnitHeader::new(unit.sequence());
    let mut buf = BytesMut::with_capacity(HEADER_LEN + unit.payload().len());
    buf.extend_from_slice(header.as_bytes());
    buf.extend_from_slice(unit.payload());
    buf.freeze()
}

/// Unmarshal a transport message. The payload is a zero-copy slice of `raw`.
pub fn decode(raw: Bytes) -> Result<Unit, WireError> {
    let header =
        UnitHeader::read_from_prefix(raw.as_ref()).ok_or(WireError::Truncated(raw.len()))?;
    Ok(Unit::new(header.sequence(), raw.slice(HEADER_LEN..)))
}

// ── Topics ───────────────────────────────────────────────────────────────────

/// Topic identifier — BLAKE3 hash of a canonical topic name.
pub type TopicId = [u8; 32];

/// Compute a TopicId from a topic name.
pub fn topic_id(name: &str) -> TopicId {
    *blake3::hash(name.as_bytes()).as_bytes()
}

// ── Constants ────────────────────────────────────────────────────────────────

/// Topic the demo relays words on.
pub const DEFAULT_TOPIC: &str = "ordo.bee_movie";

// ── Errors ───────────────────────────────────────────────────────────────────

/// Errors that can arise when interpreting wire-format data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("message of {0} bytes is shorter than the {}-byte sequence prefix", HEADER_LEN)]
    Truncated(usize),
}

// ── Tests ────────────────────────────────────────────────────────────────────
