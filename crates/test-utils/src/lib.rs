//! Test fixtures shared by the watcher, sequencer and integration tests.

use std::time::Duration;

use goliath_primitives::prelude::*;

pub mod chain;

pub use chain::{MockChain, MockSession};

/// Builds the transaction the [`MockChain`] stores at `index`.
pub fn make_tx(index: u64) -> ChainTransaction {
    ChainTransaction::new(
        index,
        HexBytes::from(index.to_be_bytes()),
        HexBytes::new(format!("tx-{index}").into_bytes()),
        0,
    )
}

/// Builds the transactions for each index of `indices`.
pub fn make_txs(indices: impl IntoIterator<Item = u64>) -> Vec<ChainTransaction> {
    indices.into_iter().map(make_tx).collect()
}

/// Polls `cond` every few millis until it holds, panicking after `timeout`.
pub async fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + timeout;
    while !cond() {
        if tokio::time::Instant::now() > deadline {
            panic!("condition not met within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
