//! ordo-demo — relays words between nodes over an unordered bus and reads
//! them back in order.
//!
//! Usage: `ordo-demo [WORD...]`. Without arguments the opening line of the
//! bee movie is relayed. Set `RUST_LOG=ordo_services=debug` to watch units
//! being buffered and drained.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use rand::seq::SliceRandom;

use ordo_core::config::OrdoConfig;
use ordo_core::wire::topic_id;
use ordo_core::SequenceNumber;
use ordo_services::{BusSettings, LocalBus, OrderingNode, Transport};

const BEE_MOVIE: &str = "According to all known laws of aviation, there is no way a bee \
                         should be able to fly.";

/// Slack on top of the bus's own jitter before a missing word is fatal.
const WORD_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = OrdoConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = OrdoConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        OrdoConfig::default()
    });

    let mut words: Vec<String> = std::env::args().skip(1).collect();
    if words.is_empty() {
        words = BEE_MOVIE.split_whitespace().map(String::from).collect();
    }

    let settings = BusSettings::from(&config.transport);
    tracing::info!(
        topic = %config.transport.topic,
        max_jitter_ms = config.transport.max_jitter_ms,
        duplicate_percent = settings.duplicate_percent,
        max_pending = config.reorder.max_pending,
        words = words.len(),
        "ordo-demo starting"
    );

    let bus = LocalBus::new(settings);
    let transport: Arc<dyn Transport> = Arc::new(bus.clone());
    let topic = topic_id(&config.transport.topic);

    // ── Join nodes ───────────────────────────────────────────────────────────

    let mut nodes = Vec::with_capacity(config.node.names.len());
    for name in &config.node.names {
        let node = OrderingNode::join(name.clone(), transport.clone(), topic, &config.reorder)
            .await
            .with_context(|| format!("node {name} failed to join"))?;
        nodes.push(node);
    }
    let publisher = nodes.first().context("no nodes configured")?;

    // ── Publish out of order ─────────────────────────────────────────────────

    let mut order: Vec<usize> = (0..words.len()).collect();
    order.shuffle(&mut rand::thread_rng());
    for &index in &order {
        let seq = u32::try_from(index + 1)
            .map(SequenceNumber::new)
            .context("too many words for one stream")?;
        publisher
            .publish_at(words[index].clone(), seq)
            .with_context(|| format!("failed to publish word {seq}"))?;
    }
    tracing::info!(
        publisher = publisher.name(),
        order = ?order.iter().map(|i| i + 1).collect::<Vec<_>>(),
        "published with shuffled sequence numbers"
    );

    // ── Read back in order ───────────────────────────────────────────────────

    let word_timeout = settings.max_jitter + WORD_TIMEOUT;
    let relay = async {
        for node in &nodes {
            let mut received = Vec::with_capacity(words.len());
            for position in 1..=words.len() {
                let unit = node.next_timeout(word_timeout).await.with_context(|| {
                    format!("node {} never received word {position}", node.name())
                })?;
                let word = String::from_utf8_lossy(unit.payload()).into_owned();
                println!("{:>6} {:>4}  {}", node.name(), unit.sequence().get(), word);
                received.push(word);
            }
            if received != words {
                bail!("node {} received words out of order", node.name());
            }
        }
        Ok::<_, anyhow::Error>(())
    };

    tokio::select! {
        r = relay => r?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted");
            return Ok(());
        }
    }

    let stats: Vec<_> = nodes.iter().map(OrderingNode::stats).collect();
    println!("{}", serde_json::to_string_pretty(&stats)?);

    bus.close();
    tracing::info!(nodes = nodes.len(), "every node read every word in order");
    Ok(())
}
