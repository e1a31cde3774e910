//! Transport adapter — the boundary between raw pub/sub bytes and units.
//!
//! Outbound units are encoded and published on the node's topic. Inbound
//! messages are decoded and handed to the reorder buffer. A malformed
//! message is a protocol violation by some peer: it is logged, counted, and
//! dropped without disturbing the receive loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::oneshot;

use ordo_core::{wire, TopicId, Unit};

use crate::reorder::{Arrival, ReorderBuffer};
use crate::transport::{Subscription, Transport, TransportError};

/// Counters for one adapter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdapterStats {
    pub sent: u64,
    pub received: u64,
    pub malformed: u64,
}

pub struct TransportAdapter {
    /// Node name, for logs.
    node: String,
    transport: Arc<dyn Transport>,
    topic: TopicId,
    sent: AtomicU64,
    received: AtomicU64,
    malformed: AtomicU64,
}

impl TransportAdapter {
    pub fn new(node: impl Into<String>, transport: Arc<dyn Transport>, topic: TopicId) -> Self {
        Self {
            node: node.into(),
            transport,
            topic,
            sent: AtomicU64::new(0),
            received: AtomicU64::new(0),
            malformed: AtomicU64::new(0),
        }
    }

    pub fn topic(&self) -> &TopicId {
        &self.topic
    }

    /// Encode and publish one unit. Returns once the transport accepted it,
    /// not once anyone received it.
    pub fn send(&self, unit: &Unit) -> Result<(), TransportError> {
        let raw = wire::encode(unit);
        let len = raw.len();
        self.transport.publish(&self.topic, raw)?;
        self.sent.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            node = %self.node,
            seq = unit.sequence().get(),
            bytes = len,
            "unit published"
        );
        Ok(())
    }

    /// Open the inbound side on this adapter's topic.
    pub fn subscribe(&self) -> Result<Subscription, TransportError> {
        self.transport.subscribe(&self.topic)
    }

    /// Decode one raw delivery and pass it to `buffer`.
    /// Returns `None` if the message was malformed and dropped.
    pub fn ingest(&self, raw: Bytes, buffer: &ReorderBuffer) -> Option<Arrival> {
        self.received.fetch_add(1, Ordering::Relaxed);
        let len = raw.len();
        match wire::decode(raw) {
            Ok(unit) => {
                let seq = unit.sequence().get();
                let head = unit.payload().slice(..unit.payload().len().min(8));
                let arrival = buffer.on_arrival(unit);
                tracing::trace!(
                    node = %self.node,
                    seq,
                    payload_head = %hex::encode(&head),
                    ?arrival,
                    "unit arrived"
                );
                Some(arrival)
            }
            Err(e) => {
                self.malformed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    node = %self.node,
                    bytes = len,
                    error = %e,
                    "protocol violation, discarding malformed unit"
                );
                None
            }
        }
    }

    /// Feed every delivery from `subscription` into `buffer` until the
    /// subscription ends.
    ///
    /// `ready` fires once the loop is running, so callers can wait on an
    /// explicit signal instead of sleeping.
    pub async fn receive_loop(
        self: Arc<Self>,
        mut subscription: Subscription,
        buffer: Arc<ReorderBuffer>,
        ready: oneshot::Sender<()>,
    ) {
        tracing::info!(
            node = %self.node,
            topic = hex::encode(&self.topic[..8]),
            "receive loop starting"
        );
        // The joiner may have given up waiting; the loop still runs.
        let _ = ready.send(());

        while let Some(raw) = subscription.next().await {
            self.ingest(raw, &buffer);
        }

        tracing::info!(node = %self.node, "subscription ended, receive loop exiting");
    }

    pub fn stats(&self) -> AdapterStats {
        AdapterStats {
            sent: self.sent.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
        }
    }
}
