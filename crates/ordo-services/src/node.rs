//! Ordering node — one participant on a topic.
//!
//! Wires a sequencer, a transport adapter, and a reorder buffer together and
//! owns the receive task that feeds the buffer. `join` resolves only after
//! that task reports it is running, so callers never need to sleep before
//! publishing.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use ordo_core::config::ReorderConfig;
use ordo_core::{SequenceNumber, TopicId, Unit};

use crate::adapter::{AdapterStats, TransportAdapter};
use crate::reorder::{ReorderBuffer, ReorderStats};
use crate::sequencer::{PublishError, Sequencer};
use crate::transport::{Transport, TransportError};

#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("failed to subscribe: {0}")]
    Subscribe(#[from] TransportError),

    #[error("receive loop exited before signalling readiness")]
    ReceiveLoopExited,
}

/// Snapshot of a node's counters.
#[derive(Debug, Clone, Serialize)]
pub struct NodeStats {
    pub name: String,
    pub adapter: AdapterStats,
    pub reorder: ReorderStats,
}

pub struct OrderingNode {
    name: String,
    sequencer: Sequencer,
    adapter: Arc<TransportAdapter>,
    buffer: Arc<ReorderBuffer>,
    receive_task: JoinHandle<()>,
}

impl OrderingNode {
    /// Subscribe to `topic` and start receiving.
    ///
    /// Returns once the subscription is live and the receive task is
    /// running. Must be called from within a tokio runtime.
    pub async fn join(
        name: impl Into<String>,
        transport: Arc<dyn Transport>,
        topic: TopicId,
        config: &ReorderConfig,
    ) -> Result<Self, NodeError> {
        let name = name.into();
        let adapter = Arc::new(TransportAdapter::new(name.clone(), transport, topic));
        let buffer = Arc::new(ReorderBuffer::new(config));
        let subscription = adapter.subscribe()?;

        let (ready_tx, ready_rx) = oneshot::channel();
        let receive_task = tokio::spawn(adapter.clone().receive_loop(
            subscription,
            buffer.clone(),
            ready_tx,
        ));
        ready_rx.await.map_err(|_| NodeError::ReceiveLoopExited)?;

        tracing::info!(
            node = %name,
            topic = hex::encode(&topic[..8]),
            max_pending = config.max_pending,
            "node joined"
        );

        Ok(Self {
            name,
            sequencer: Sequencer::new(adapter.clone()),
            adapter,
            buffer,
            receive_task,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Publish under the next automatic sequence number.
    pub fn publish_next(
        &self,
        payload: impl Into<Bytes>,
    ) -> Result<SequenceNumber, PublishError> {
        self.sequencer.publish_next(payload)
    }

    /// Publish under an explicit sequence number. For replay and for
    /// exercising out-of-order delivery.
    pub fn publish_at(
        &self,
        payload: impl Into<Bytes>,
        sequence: SequenceNumber,
    ) -> Result<(), PublishError> {
        self.sequencer.publish_at(payload, sequence)
    }

    /// Wait for the next unit in sequence order. Never returns if the gap
    /// never fills; see [`next_timeout`](Self::next_timeout).
    pub async fn next(&self) -> Unit {
        self.buffer.next().await
    }

    /// Like [`next`](Self::next), giving up after `timeout`.
    /// Nothing is lost on timeout.
    pub async fn next_timeout(&self, timeout: Duration) -> Option<Unit> {
        tokio::time::timeout(timeout, self.buffer.next()).await.ok()
    }

    /// The next unit if one is already available.
    pub fn try_next(&self) -> Option<Unit> {
        self.buffer.try_next()
    }

    /// The next unit's payload as text. Invalid UTF-8 is replaced, not
    /// rejected.
    pub async fn next_text(&self) -> String {
        let unit = self.next().await;
        String::from_utf8_lossy(unit.payload()).into_owned()
    }

    /// False once the subscription has ended.
    pub fn is_receiving(&self) -> bool {
        !self.receive_task.is_finished()
    }

    pub fn stats(&self) -> NodeStats {
        NodeStats {
            name: self.name.clone(),
            adapter: self.adapter.stats(),
            reorder: self.buffer.stats(),
        }
    }

    /// Stop receiving and wait for the receive task to finish.
    /// Units already released are dropped with the node.
    pub async fn shutdown(mut self) {
        self.receive_task.abort();
        let _ = (&mut self.receive_task).await;
        let stats = self.buffer.stats();
        tracing::info!(
            node = %self.name,
            released = stats.released,
            pending = stats.pending,
            "node shut down"
        );
    }
}

impl Drop for OrderingNode {
    fn drop(&mut self) {
        self.receive_task.abort();
        tracing::debug!(node = %self.name, "node left");
    }
}
