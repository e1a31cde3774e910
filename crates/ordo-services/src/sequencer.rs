//! Sequencer — numbers outgoing units and hands them to the transport.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

use ordo_core::{SequenceNumber, Unit};

use crate::adapter::TransportAdapter;
use crate::transport::TransportError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    #[error("sequence numbers exhausted; the stream ended at {}", SequenceNumber::LAST)]
    SequenceExhausted,

    #[error("transport rejected publish: {0}")]
    Transport(#[from] TransportError),
}

/// Assigns sequence numbers for one sender stream.
///
/// `publish_next` and `publish_at` share the counter, but only
/// `publish_next` advances it: explicit numbers exist to replay or to
/// simulate reordering and never disturb automatic numbering.
///
/// A number is consumed only once the transport has accepted its unit; the
/// counter lock is held across the send.
pub struct Sequencer {
    /// Next automatic number. Widened so exhaustion is representable.
    next: Mutex<u64>,
    adapter: Arc<TransportAdapter>,
}

impl Sequencer {
    pub fn new(adapter: Arc<TransportAdapter>) -> Self {
        Self {
            next: Mutex::new(u64::from(SequenceNumber::FIRST.get())),
            adapter,
        }
    }

    fn counter(&self) -> MutexGuard<'_, u64> {
        self.next.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish `payload` under the next automatic sequence number.
    ///
    /// Returns the number used. Does not wait for delivery. If the
    /// transport rejects the unit the number stays unused.
    pub fn publish_next(
        &self,
        payload: impl Into<Bytes>,
    ) -> Result<SequenceNumber, PublishError> {
        let mut next = self.counter();
        let seq = u32::try_from(*next)
            .map(SequenceNumber::new)
            .map_err(|_| PublishError::SequenceExhausted)?;

        self.adapter.send(&Unit::new(seq, payload))?;
        *next += 1;
        Ok(seq)
    }

    /// Publish `payload` under an explicit sequence number, verbatim.
    /// The automatic counter is left alone.
    pub fn publish_at(
        &self,
        payload: impl Into<Bytes>,
        sequence: SequenceNumber,
    ) -> Result<(), PublishError> {
        self.adapter.send(&Unit::new(sequence, payload))?;
        Ok(())
    }

    /// The number `publish_next` would use, or `None` once exhausted.
    pub fn peek_next(&self) -> Option<SequenceNumber> {
        u32::try_from(*self.counter())
            .ok()
            .map(SequenceNumber::new)
    }
}
