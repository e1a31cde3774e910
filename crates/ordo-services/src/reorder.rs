//! Reorder buffer — releases units strictly in sequence order.
//!
//! Arrivals come from the transport in any order, possibly concurrently and
//! possibly more than once. Units ahead of `next_expected` wait in a pending
//! map; the unit that fills the gap releases itself plus every contiguous
//! successor in one drain. Each unit is inserted and removed at most once, so
//! the work per arrival is O(1) amortized.
//!
//! Released units go into an unbounded channel while the state lock is still
//! held. Channel order is therefore release order, and a consumer parked in
//! [`ReorderBuffer::next`] is woken by the channel itself, never by polling.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc;

use ordo_core::config::ReorderConfig;
use ordo_core::{SequenceNumber, Unit};

/// What `on_arrival` did with a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    /// The unit filled the gap. Carries how many units were released,
    /// counting the arrival itself.
    Released(usize),
    /// Ahead of the gap. Held until its predecessors arrive.
    Buffered,
    /// Already released, or below the first sequence number.
    Stale,
    /// Already pending. The first copy wins.
    Duplicate,
    /// Ahead of the gap, but the pending map is at capacity.
    Overflow,
}

/// Counters for one reorder buffer. Snapshotted under the state lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReorderStats {
    /// Next sequence number the buffer will release. `2^32` once exhausted.
    pub next_expected: u64,
    /// Units currently held out of order.
    pub pending: usize,
    pub released: u64,
    pub buffered: u64,
    pub stale: u64,
    pub duplicates: u64,
    pub overflowed: u64,
}

struct ReorderState {
    /// Widened so that releasing `u32::MAX` has a successor.
    next_expected: u64,
    pending: BTreeMap<u32, Unit>,
    /// 0 = unlimited.
    max_pending: usize,
    stats: ReorderStats,
}

impl ReorderState {
    /// Hand `unit` to the delivery queue, then drain every pending unit that
    /// is now contiguous. Returns the number of units released.
    fn release(&mut self, unit: Unit, ready: &mpsc::UnboundedSender<Unit>) -> usize {
        let mut released = 0;
        let mut next = Some(unit);
        while let Some(unit) = next {
            // The receiver lives as long as the buffer, so this cannot fail.
            let _ = ready.send(unit);
            released += 1;
            self.next_expected += 1;
            next = u32::try_from(self.next_expected)
                .ok()
                .and_then(|seq| self.pending.remove(&seq));
        }
        self.stats.released += released as u64;
        released
    }
}

/// In-order reassembly over an unordered, at-least-once transport.
///
/// Share it behind an `Arc`: the transport adapter calls
/// [`on_arrival`](Self::on_arrival) from its receive task while consumers
/// call [`next`](Self::next) from theirs.
pub struct ReorderBuffer {
    state: Mutex<ReorderState>,
    ready_tx: mpsc::UnboundedSender<Unit>,
    /// Consumers queue on this lock in FIFO order, so each `next()` claims
    /// one distinct unit, first come first served.
    ready_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Unit>>,
}

impl ReorderBuffer {
    /// A buffer that expects sequence number 1 first.
    pub fn new(config: &ReorderConfig) -> Self {
        Self::starting_at(SequenceNumber::FIRST, config)
    }

    /// A buffer that expects `first` first. Anything below it is stale.
    /// Used to resume a stream at a known position.
    pub fn starting_at(first: SequenceNumber, config: &ReorderConfig) -> Self {
        let (ready_tx, ready_rx) = mpsc::unbounded_channel();
        let next_expected = u64::from(first.get());
        Self {
            state: Mutex::new(ReorderState {
                next_expected,
                pending: BTreeMap::new(),
                max_pending: config.max_pending,
                stats: ReorderStats {
                    next_expected,
                    ..ReorderStats::default()
                },
            }),
            ready_tx,
            ready_rx: tokio::sync::Mutex::new(ready_rx),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ReorderState> {
        // Every mutation completes before anything that can panic, so a
        // poisoned state is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Accept one unit from the transport.
    ///
    /// Never fails: stale and duplicate arrivals are normal on an
    /// at-least-once transport and are absorbed here.
    pub fn on_arrival(&self, unit: Unit) -> Arrival {
        let mut state = self.lock();
        let seq = unit.sequence();
        let position = u64::from(seq.get());

        let arrival = if position < state.next_expected {
            state.stats.stale += 1;
            tracing::trace!(seq = seq.get(), "stale arrival, discarding");
            Arrival::Stale
        } else if position == state.next_expected {
            let released = state.release(unit, &self.ready_tx);
            if released > 1 {
                tracing::debug!(
                    from = seq.get(),
                    released,
                    pending = state.pending.len(),
                    "gap filled, drained contiguous run"
                );
            } else {
                tracing::trace!(seq = seq.get(), "released in order");
            }
            Arrival::Released(released)
        } else if state.pending.contains_key(&seq.get()) {
            state.stats.duplicates += 1;
            tracing::trace!(seq = seq.get(), "duplicate of pending unit, discarding");
            Arrival::Duplicate
        } else if state.max_pending != 0 && state.pending.len() >= state.max_pending {
            state.stats.overflowed += 1;
            tracing::warn!(
                seq = seq.get(),
                next_expected = state.next_expected,
                max_pending = state.max_pending,
                "pending set full, refusing out-of-order unit"
            );
            Arrival::Overflow
        } else {
            state.pending.insert(seq.get(), unit);
            state.stats.buffered += 1;
            tracing::trace!(
                seq = seq.get(),
                next_expected = state.next_expected,
                "out of order, buffering"
            );
            Arrival::Buffered
        };

        state.stats.next_expected = state.next_expected;
        state.stats.pending = state.pending.len();
        arrival
    }

    /// Wait for the next unit in sequence order.
    ///
    /// Suspends the calling task until a unit is released; there is no end of
    /// stream, so this waits forever if the gap never fills. Cancel-safe:
    /// dropping the future before it resolves loses nothing.
    pub async fn next(&self) -> Unit {
        let mut ready = self.ready_rx.lock().await;
        match ready.recv().await {
            Some(unit) => unit,
            // `self` owns the sender, so the channel never closes under us.
            None => std::future::pending().await,
        }
    }

    /// The next unit if one is already released, without waiting.
    ///
    /// Returns `None` while another consumer is parked in [`next`](Self::next).
    pub fn try_next(&self) -> Option<Unit> {
        let mut ready = self.ready_rx.try_lock().ok()?;
        ready.try_recv().ok()
    }

    /// The lowest sequence number not yet released.
    /// `None` once `u32::MAX` has been released.
    pub fn next_expected(&self) -> Option<SequenceNumber> {
        u32::try_from(self.lock().next_expected)
            .ok()
            .map(SequenceNumber::new)
    }

    /// Sequence numbers currently held out of order, ascending.
    pub fn pending(&self) -> Vec<SequenceNumber> {
        self.lock()
            .pending
            .keys()
            .copied()
            .map(SequenceNumber::new)
            .collect()
    }

    pub fn stats(&self) -> ReorderStats {
        self.lock().stats
    }
}

impl Default for ReorderBuffer {
    fn default() -> Self {
        Self::new(&ReorderConfig::default())
    }
}
