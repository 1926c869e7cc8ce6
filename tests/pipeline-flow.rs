//! Ordered, exactly-once execution across blocks, reconnects and redelivered
//! headers, with a bounded queue.

use std::time::Duration;

use common::pipeline::{chain_config, sequencer_config, Pipeline, RecordingExecutor};
use goliath_primitives::prelude::*;
use goliath_test_utils::{wait_until, MockChain};

#[allow(dead_code)]
mod common;

#[tokio::test]
async fn executes_backlog_and_new_blocks_in_order() {
    let chain = MockChain::new();
    chain.produce_block(4);
    let p = Pipeline::start(chain, RecordingExecutor::new(), chain_config(), sequencer_config(None));

    p.wait_for_calls(4).await;
    for n in [1, 0, 3, 2] {
        p.chain.produce_block(n);
    }
    p.wait_for_calls(10).await;
    assert_eq!(p.exec.calls(), (0..10).collect::<Vec<_>>());

    let (feed, report) = p.stop().await;
    assert!(matches!(feed, Some(Ok(()))));
    assert_eq!(report.resume_index, Some(10));
    assert!(report.pending.is_empty());
}

#[tokio::test]
async fn order_and_uniqueness_across_reconnects() {
    let p = Pipeline::start_default();

    for round in 0..5u64 {
        p.chain.produce_block(3);
        p.wait_for_calls(((round + 1) * 3) as usize).await;

        // Replay the latest header, then cut the stream.
        let last = BlockHeader::new(
            p.chain.height(),
            0,
            HexBytes::from(p.chain.height().to_be_bytes()),
            p.chain.tx_count(),
        );
        p.chain.send_header(last);
        p.chain.drop_subscriptions();
    }
    p.chain.produce_block(2);
    p.wait_for_calls(17).await;

    // Give any duplicate a chance to show up.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(p.exec.calls(), (0..17).collect::<Vec<_>>());
    assert!(p.chain.connect_count() >= 2);

    let (_, report) = p.stop().await;
    assert_eq!(report.succeeded, 17);
}

#[tokio::test]
async fn resumes_after_stream_drop_without_loss() {
    let p = Pipeline::start_default();
    p.chain.produce_block(5);
    p.wait_for_calls(5).await;

    p.chain.drop_subscriptions();
    // Nobody hears about this block, the reconnect catches it up.
    p.chain.produce_block(5);
    p.wait_for_calls(10).await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(p.exec.calls(), (0..10).collect::<Vec<_>>());
    assert_eq!(p.chain.connect_count(), 2);
    p.stop().await;
}

#[tokio::test]
async fn full_queue_stops_fetching() {
    let chain = MockChain::new();
    chain.produce_block(10);
    let mut config = chain_config();
    config.fetch_batch_limit = 2;
    let exec = RecordingExecutor::gated();
    let p = Pipeline::start(chain, exec, config, sequencer_config(Some(2)));

    // Tx 0 blocked in the executor and tx 1 queued fill the queue, the feed
    // is stuck enqueueing tx 2.
    p.wait_for_calls(1).await;
    wait_until(common::pipeline::WAIT, || p.chain.fetch_log().len() == 4).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(p.exec.calls(), vec![0]);
    assert_eq!(p.chain.fetch_log().len(), 4);

    // Tx 2 takes the freed slot, tx 3 is now the one waiting.
    p.exec.release(1);
    p.wait_for_calls(2).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(p.exec.calls(), vec![0, 1]);
    assert_eq!(p.chain.fetch_log().len(), 4);

    p.exec.release_all();
    p.wait_for_calls(10).await;
    assert_eq!(p.exec.calls(), (0..10).collect::<Vec<_>>());
    let mut fetched = p.chain.fetch_log();
    fetched.sort_unstable();
    assert_eq!(fetched, (0..10).collect::<Vec<_>>());
    p.stop().await;
}

#[tokio::test]
async fn shutdown_finishes_in_flight_and_reports_queue() {
    let chain = MockChain::new();
    chain.produce_block(5);
    let exec = RecordingExecutor::gated();
    let p = Pipeline::start(chain, exec, chain_config(), sequencer_config(None));

    p.wait_for_calls(1).await;
    wait_until(common::pipeline::WAIT, || p.chain.fetch_log().len() == 5).await;

    p.shutdown();
    p.exec.release(1);
    let exec = p.exec.clone();
    let (feed, report) = p.join().await;

    assert!(matches!(feed, Some(Ok(()))));
    assert_eq!(exec.calls(), vec![0]);
    assert_eq!(report.succeeded, 1);
    assert_eq!(
        report
            .pending
            .iter()
            .map(|t| t.sequence_index())
            .collect::<Vec<_>>(),
        vec![1, 2, 3, 4]
    );
    assert_eq!(report.resume_index, Some(1));
}
