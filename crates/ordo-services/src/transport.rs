//! Transport trait — the pub/sub substrate Ordo rides on.
//!
//! Deliberately weak. Implementations may deliver late, out of order, or
//! more than once, and a publisher may receive its own publishes. Nothing
//! above this trait relies on anything stronger.

use bytes::Bytes;
use futures::stream::BoxStream;

use ordo_core::TopicId;

/// Raw messages delivered for one topic subscription.
pub type Subscription = BoxStream<'static, Bytes>;

/// Trait for pub/sub transports.
pub trait Transport: Send + Sync {
    /// Publish raw bytes to every subscriber of `topic`.
    ///
    /// Best-effort and non-blocking: returning `Ok` says nothing about
    /// whether, when, or how often subscribers see the message.
    fn publish(&self, topic: &TopicId, bytes: Bytes) -> Result<(), TransportError>;

    /// Subscribe to `topic`. The subscription is live when this returns.
    fn subscribe(&self, topic: &TopicId) -> Result<Subscription, TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("transport is closed")]
    Closed,

    #[error("no async runtime available to schedule delivery")]
    NoRuntime,
}
