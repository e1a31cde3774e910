use crate::*;

use ordo_core::SequenceNumber;

/// One word published by A comes back on both nodes.
#[tokio::test]
async fn test_single_word() -> Result<()> {
    let cluster = Cluster::pair().await?;
    let (a, b) = (cluster.node(0), cluster.node(1));

    let seq = a.publish_next("hello")?;
    assert_eq!(seq, SequenceNumber::FIRST);

    assert_eq!(next_word(&a).await?, "hello");
    assert_eq!(next_word(&b).await?, "hello");
    Ok(())
}

/// Ten auto-numbered words arrive shuffled by the bus and are read in
/// publish order on every node.
#[tokio::test]
async fn test_ten_words_in_publish_order() -> Result<()> {
    let cluster = Cluster::pair().await?;
    let a = cluster.node(0);
    let words: Vec<String> = (1..=10).map(|i| format!("word-{i}")).collect();

    for word in &words {
        a.publish_next(word.clone())?;
    }

    for node in &cluster.nodes {
        assert_eq!(next_words(node, words.len()).await?, words);
    }
    Ok(())
}

/// Sequence 2 published before sequence 1 is still read second, by the
/// publisher and by its peer.
#[tokio::test]
async fn test_out_of_order_publish() -> Result<()> {
    let cluster = Cluster::pair().await?;
    let a = cluster.node(0);

    a.publish_at("second", SequenceNumber::new(2))?;
    a.publish_at("first", SequenceNumber::new(1))?;

    for node in &cluster.nodes {
        assert_eq!(next_word(node).await?, "first");
        assert_eq!(next_word(node).await?, "second");
    }
    Ok(())
}

/// A reader parked before anything is published wakes for the right unit.
#[tokio::test]
async fn test_read_before_publish() -> Result<()> {
    let cluster = Cluster::pair().await?;
    let (a, b) = (cluster.node(0), cluster.node(1));

    let reader = tokio::spawn(async move { next_words(&b, 2).await });
    tokio::task::yield_now().await;

    a.publish_at("second", SequenceNumber::new(2))?;
    a.publish_at("first", SequenceNumber::new(1))?;

    let words = reader.await.context("reader task panicked")??;
    assert_eq!(words, ["first", "second"]);
    Ok(())
}

/// Ten letters published concurrently under a fixed permutation of
/// sequence numbers, while both nodes are already reading, spell the
/// alphabet on both nodes.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_permuted_publishes() -> Result<()> {
    let cluster = Cluster::pair().await?;
    let a = cluster.node(0);

    let sequences = [5u32, 2, 4, 9, 1, 8, 3, 6, 7, 10];
    let letters = ["e", "b", "d", "i", "a", "h", "c", "f", "g", "j"];

    let readers: Vec<_> = cluster
        .nodes
        .iter()
        .map(|node| {
            let node = node.clone();
            tokio::spawn(async move { next_words(&node, letters.len()).await })
        })
        .collect();

    let publishers: Vec<_> = sequences
        .into_iter()
        .zip(letters)
        .map(|(seq, letter)| {
            let a = a.clone();
            tokio::spawn(async move { a.publish_at(letter, SequenceNumber::new(seq)) })
        })
        .collect();
    for publisher in publishers {
        publisher.await.context("publisher task panicked")??;
    }

    let expected = ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"];
    for reader in readers {
        let words = reader.await.context("reader task panicked")??;
        assert_eq!(words, expected);
    }
    Ok(())
}

/// Nothing crosses a missing sequence number, and the stall clears the
/// moment it arrives.
#[tokio::test]
async fn test_gap_stalls_until_filled() -> Result<()> {
    let cluster = Cluster::pair().await?;
    let (a, b) = (cluster.node(0), cluster.node(1));

    a.publish_at("one", SequenceNumber::new(1))?;
    a.publish_at("three", SequenceNumber::new(3))?;
    a.publish_at("four", SequenceNumber::new(4))?;

    assert_eq!(next_word(&b).await?, "one");
    assert_stalled(&b).await;
    assert_eq!(b.stats().reorder.pending, 2);

    a.publish_at("two", SequenceNumber::new(2))?;
    assert_eq!(next_words(&b, 3).await?, ["two", "three", "four"]);
    assert_eq!(b.stats().reorder.pending, 0);
    Ok(())
}

/// Peers publishing on the same topic share one sequence space: the numbers
/// they choose decide the order, not who sent them.
#[tokio::test]
async fn test_publishers_interleave_by_sequence() -> Result<()> {
    let cluster = Cluster::pair().await?;
    let (a, b) = (cluster.node(0), cluster.node(1));

    b.publish_at("from b", SequenceNumber::new(2))?;
    a.publish_at("from a", SequenceNumber::new(1))?;

    for node in &cluster.nodes {
        assert_eq!(next_words(node, 2).await?, ["from a", "from b"]);
    }
    Ok(())
}
