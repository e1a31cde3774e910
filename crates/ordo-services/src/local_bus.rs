//! In-process pub/sub bus with deliberately unordered delivery.
//!
//! Stands in for a networked pub/sub transport in the demo and in tests.
//! Each delivery to each subscriber runs on its own task after a random
//! delay, so publishes overtake each other freely. A configurable share of
//! deliveries is sent twice. Publishers receive their own messages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use futures::StreamExt;
use rand::Rng;
use tokio::sync::mpsc;

use ordo_core::config::TransportConfig;
use ordo_core::TopicId;

use crate::transport::{Subscription, Transport, TransportError};

/// Delivery behaviour of a [`LocalBus`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BusSettings {
    /// Each delivery waits a uniform random delay in `0..=max_jitter`.
    pub max_jitter: Duration,
    /// Chance, in percent, that a delivery is duplicated.
    pub duplicate_percent: u8,
}

impl From<&TransportConfig> for BusSettings {
    fn from(config: &TransportConfig) -> Self {
        Self {
            max_jitter: Duration::from_millis(config.max_jitter_ms),
            duplicate_percent: config.duplicate_percent.min(100),
        }
    }
}

/// Cloneable handle to one shared bus. All clones see the same topics.
#[derive(Clone, Default)]
pub struct LocalBus {
    /// topic -> live subscriber queues
    topics: Arc<DashMap<TopicId, Vec<mpsc::UnboundedSender<Bytes>>>>,
    settings: BusSettings,
    closed: Arc<AtomicBool>,
}

impl LocalBus {
    pub fn new(settings: BusSettings) -> Self {
        Self {
            topics: Arc::new(DashMap::new()),
            settings,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn settings(&self) -> BusSettings {
        self.settings
    }

    /// Count live subscribers on a topic.
    pub fn subscriber_count(&self, topic: &TopicId) -> usize {
        self.topics
            .get(topic)
            .map(|subs| subs.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// Close the bus. Subscriptions end once in-flight deliveries finish;
    /// later publishes and subscribes fail with [`TransportError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.topics.clear();
        tracing::debug!("local bus closed");
    }

    /// `max_jitter` in whole milliseconds, saturating.
    fn max_jitter_ms(&self) -> u64 {
        u64::try_from(self.settings.max_jitter.as_millis()).unwrap_or(u64::MAX)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Transport for LocalBus {
    fn publish(&self, topic: &TopicId, bytes: Bytes) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| TransportError::NoRuntime)?;

        let targets = match self.topics.get_mut(topic) {
            Some(mut subs) => {
                subs.retain(|tx| !tx.is_closed());
                subs.clone()
            }
            None => Vec::new(),
        };
        if targets.is_empty() {
            tracing::trace!(topic = hex::encode(&topic[..8]), "publish with no subscribers");
            return Ok(());
        }

        let max_jitter_ms = self.max_jitter_ms();
        let mut rng = rand::thread_rng();
        for tx in targets {
            let copies = if rng.gen_range(0..100u8) < self.settings.duplicate_percent {
                2
            } else {
                1
            };
            for _ in 0..copies {
                let delay = Duration::from_millis(rng.gen_range(0..=max_jitter_ms));
                let tx = tx.clone();
                let bytes = bytes.clone();
                runtime.spawn(async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    // A dropped subscriber is not an error on a best-effort bus.
                    let _ = tx.send(bytes);
                });
            }
        }
        Ok(())
    }

    fn subscribe(&self, topic: &TopicId) -> Result<Subscription, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.topics.entry(*topic).or_default().push(tx);
        tracing::debug!(topic = hex::encode(&topic[..8]), "subscribed");

        Ok(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|bytes| (bytes, rx))
        })
        .boxed())
    }
}
