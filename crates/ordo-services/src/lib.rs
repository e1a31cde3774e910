//! ordo-services — in-order delivery on top of an unordered pub/sub transport.
//!
//! Outbound: [`Sequencer`] → [`TransportAdapter`] → [`Transport`].
//! Inbound: [`Transport`] → [`TransportAdapter`] → [`ReorderBuffer`] → consumer.
//! [`OrderingNode`] assembles both directions for one participant.

pub mod adapter;
pub mod local_bus;
pub mod node;
pub mod reorder;
pub mod sequencer;
pub mod transport;

pub use adapter::{AdapterStats, TransportAdapter};
pub use local_bus::{BusSettings, LocalBus};
pub use node::{NodeError, NodeStats, OrderingNode};
pub use reorder::{Arrival, ReorderBuffer, ReorderStats};
pub use sequencer::{PublishError, Sequencer};
pub use transport::{Subscription, Transport, TransportError};
