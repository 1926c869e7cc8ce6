use serde::{Deserialize, Serialize};

use crate::buf::HexBytes;

/// Header of a committed block, as reported by the chain service.
///
/// Immutable once observed.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    /// Block height, monotonically increasing from 0.
    pub height: u64,

    /// Block time, UNIX seconds.
    pub time: u64,

    /// Commit hash of the block.
    pub commit_hash: HexBytes,

    /// Cumulative number of transactions committed up to and including this
    /// block.
    pub tx_count_at_height: u64,
}

impl BlockHeader {
    pub fn new(height: u64, time: u64, commit_hash: HexBytes, tx_count_at_height: u64) -> Self {
        Self {
            height,
            time,
            commit_hash,
            tx_count_at_height,
        }
    }
}

/// Parameters identifying the chain a session is connected to.
///
/// Fetched once per connection, and expected to never change for the lifetime
/// of a watcher.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainParams {
    pub chain_id: String,

    /// Commitment to the genesis state.
    pub genesis_hash: HexBytes,
}

impl ChainParams {
    pub fn new(chain_id: impl Into<String>, genesis_hash: HexBytes) -> Self {
        Self {
            chain_id: chain_id.into(),
            genesis_hash,
        }
    }
}
