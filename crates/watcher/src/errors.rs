use goliath_chain_client::ChainClientError;
use goliath_primitives::prelude::*;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatcherError {
    /// Endpoint unreachable, or its parameters couldn't be fetched.
    #[error("connection: {0}")]
    Connection(#[source] ChainClientError),

    /// Part of a delta could not be fetched. The cursor did not move.
    #[error("failed to fetch tx {index} of range {start}..{end}: {source}")]
    Fetch {
        index: u64,
        start: u64,
        end: u64,
        source: ChainClientError,
    },

    #[error("consistency violation: {0}")]
    Consistency(#[from] ConsistencyViolation),

    #[error("watcher shutting down")]
    Shutdown,
}

impl WatcherError {
    /// If calling again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Fetch { .. })
    }
}

/// The chain service contradicted what was already emitted. Fatal: the
/// watcher emits nothing more once one is seen.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConsistencyViolation {
    #[error(
        "header at height {height} reports {tx_count} txs, but {emitted} were already emitted \
         (through height {last_height})"
    )]
    Rollback {
        height: u64,
        tx_count: u64,
        emitted: u64,
        last_height: u64,
    },

    #[error(
        "header at height {height} reports {tx_count} txs, but the one accepted there reported \
         {seen_tx_count} or another commit"
    )]
    ConflictingHeader {
        height: u64,
        seen_tx_count: u64,
        tx_count: u64,
    },

    #[error("chain reports {tx_count} txs on connect, but {emitted} were already emitted")]
    CountBelowCursor { tx_count: u64, emitted: u64 },

    #[error("chain params changed from {expected:?} to {actual:?}")]
    ChainParamsMismatch {
        expected: ChainParams,
        actual: ChainParams,
    },
}
