//! Glue between the chain watcher and the sequencer's queue.

use std::time::Duration;

use goliath_chain_client::ChainService;
use goliath_common::retry::{policies::ExponentialBackoff, Backoff};
use goliath_tasks::Shutdown;
use goliath_watcher::{ChainWatcher, WatcherError};
use thiserror::Error;
use tracing::*;

use crate::{SequencerError, SequencerHandle};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("watcher: {0}")]
    Watcher(#[from] WatcherError),

    #[error("sequencer: {0}")]
    Sequencer(#[from] SequencerError),
}

/// Moves batches from the watcher into the sequencer until shutdown.
///
/// Fetch failures are retried with `retry` backoff. Returns an error on
/// anything the watcher can't recover from, ie. a consistency violation or
/// running out of connection attempts.
pub async fn feed_sequencer<S: ChainService>(
    mut watcher: ChainWatcher<S>,
    mut handle: SequencerHandle,
    retry: ExponentialBackoff,
    shutdown: Shutdown,
) -> Result<(), PipelineError> {
    let mut delay = retry.base_delay_ms();
    info!(cursor = %watcher.cursor().next_index(), "chain feed started");

    loop {
        let batch = match watcher.next_batch().await {
            Ok(batch) => {
                delay = retry.base_delay_ms();
                batch
            }
            Err(WatcherError::Shutdown) => break,
            Err(err @ WatcherError::Fetch { .. }) => {
                warn!(%err, %delay, "fetch failed, retrying");
                tokio::select! {
                    _ = shutdown.wait_for_shutdown() => break,
                    _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
                }
                delay = retry.next_delay_ms(delay);
                continue;
            }
            Err(err) => {
                error!(%err, cursor = %watcher.cursor().next_index(), "chain feed failed");
                return Err(err.into());
            }
        };

        if batch.is_empty() {
            continue;
        }

        let res = tokio::select! {
            _ = shutdown.wait_for_shutdown() => break,
            res = handle.enqueue(batch) => res,
        };
        match res {
            Ok(()) => {}
            Err(SequencerError::Closed) if shutdown.should_shutdown() => break,
            Err(err) => return Err(err.into()),
        }
    }

    info!(cursor = %watcher.cursor().next_index(), "chain feed stopped");
    Ok(())
}
