use crate::*;

use bytes::Bytes;

use ordo_core::SequenceNumber;

/// A bus that delivers everything twice still yields each word once.
#[tokio::test]
async fn test_duplicated_deliveries_are_released_once() -> Result<()> {
    let settings = BusSettings {
        max_jitter: JITTER,
        duplicate_percent: 100,
    };
    let cluster = Cluster::start(&["a", "b"], settings).await?;
    let a = cluster.node(0);
    let words: Vec<String> = (1..=10).map(|i| format!("dup-{i}")).collect();

    for word in &words {
        a.publish_next(word.clone())?;
    }

    for node in &cluster.nodes {
        assert_eq!(next_words(node, words.len()).await?, words);
        eventually("every copy to arrive", || node.stats().adapter.received == 20).await?;
        assert_stalled(node).await;

        let reorder = node.stats().reorder;
        assert_eq!(reorder.released, 10);
        assert_eq!(reorder.stale + reorder.duplicates, 10);
        assert_eq!(reorder.pending, 0);
    }
    Ok(())
}

/// Garbage on the topic is dropped without disturbing real traffic.
#[tokio::test]
async fn test_malformed_messages_are_ignored() -> Result<()> {
    let cluster = Cluster::pair().await?;
    let (a, b) = (cluster.node(0), cluster.node(1));

    cluster.bus.publish(&topic(), Bytes::new())?;
    cluster.bus.publish(&topic(), Bytes::from_static(&[0, 0, 1]))?;
    a.publish_next("survivor")?;

    assert_eq!(next_word(&b).await?, "survivor");
    eventually("both malformed messages to be counted", || {
        b.stats().adapter.malformed == 2
    })
    .await?;
    assert!(b.is_receiving());
    assert_eq!(b.stats().reorder.released, 1);
    Ok(())
}

/// An empty payload is a valid unit, not a malformed one.
#[tokio::test]
async fn test_empty_payload_is_delivered() -> Result<()> {
    let cluster = Cluster::pair().await?;
    let (a, b) = (cluster.node(0), cluster.node(1));

    a.publish_next(Bytes::new())?;
    a.publish_next("after")?;

    assert_eq!(next_words(&b, 2).await?, ["", "after"]);
    assert_eq!(b.stats().adapter.malformed, 0);
    Ok(())
}

/// A full pending set refuses new out-of-order units rather than skipping
/// the gap. A refused unit is accepted again once there is room.
#[tokio::test]
async fn test_pending_cap_refuses_then_recovers() -> Result<()> {
    let reorder = ReorderConfig { max_pending: 2 };
    let cluster = Cluster::start_with(&["a"], jittery(), &reorder).await?;
    let a = cluster.node(0);

    a.publish_at("two", SequenceNumber::new(2))?;
    a.publish_at("three", SequenceNumber::new(3))?;
    eventually("two units to be buffered", || a.stats().reorder.pending == 2).await?;

    a.publish_at("four", SequenceNumber::new(4))?;
    eventually("the third to be refused", || a.stats().reorder.overflowed == 1).await?;

    a.publish_at("one", SequenceNumber::new(1))?;
    assert_eq!(next_words(&a, 3).await?, ["one", "two", "three"]);
    assert_stalled(&a).await;

    a.publish_at("four", SequenceNumber::new(4))?;
    assert_eq!(next_word(&a).await?, "four");
    Ok(())
}

/// A node that joins late never sees earlier publishes and waits on the
/// first sequence number rather than guessing where the stream is.
#[tokio::test]
async fn test_late_joiner_waits_for_the_first_unit() -> Result<()> {
    let mut cluster = Cluster::pair().await?;
    let a = cluster.node(0);
    a.publish_next("early")?;
    assert_eq!(next_word(&a).await?, "early");

    let transport: Arc<dyn Transport> = Arc::new(cluster.bus.clone());
    let late = OrderingNode::join("late", transport, topic(), &ReorderConfig::default()).await?;
    cluster.nodes.push(Arc::new(late));
    let late = cluster.node(2);

    a.publish_next("later")?;
    assert_stalled(&late).await;
    assert_eq!(late.stats().reorder.pending, 1);
    Ok(())
}
