use async_trait::async_trait;
use goliath_primitives::prelude::*;

use crate::ChainClientError;

/// A factory for sessions with the chain service.
#[async_trait]
pub trait ChainService: Send + Sync + 'static {
    type Session: ChainSession;

    /// Connects to the service at `endpoint` and subscribes to its header
    /// stream.
    async fn connect(&self, endpoint: &str) -> Result<Self::Session, ChainClientError>;
}

/// A live connection to the chain service.
///
/// Header notifications are consumed in the order the service sent them. The
/// service may redeliver or reorder them; interpreting them is the caller's
/// job.
#[async_trait]
pub trait ChainSession: Send + Sync + 'static {
    /// Genesis/commitment parameters of the chain behind this session.
    async fn chain_params(&self) -> Result<ChainParams, ChainClientError>;

    /// Waits for the next header notification. Returns `Ok(None)` once the
    /// subscription stream has ended, after which the session is dead.
    async fn next_header(&mut self) -> Result<Option<BlockHeader>, ChainClientError>;

    /// Header of the latest committed block, if any block was committed yet.
    async fn latest_header(&self) -> Result<Option<BlockHeader>, ChainClientError>;

    /// Number of transactions committed so far.
    async fn get_transaction_count(&self) -> Result<u64, ChainClientError>;

    /// Fetches the transaction at `index` in the chain's transaction log.
    async fn get_transaction(&self, index: u64) -> Result<ChainTransaction, ChainClientError>;
}
