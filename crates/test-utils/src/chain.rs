//! In-memory chain service with fault injection.

use std::{collections::HashMap, ops::Range, sync::Arc};

use async_trait::async_trait;
use goliath_chain_client::{ChainClientError, ChainService, ChainSession};
use goliath_primitives::prelude::*;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::make_tx;

/// Cheaply cloneable handle to a shared in-memory chain. Clones observe and
/// drive the same chain, so a test can keep one while the watcher owns
/// another.
#[derive(Clone, Debug, Default)]
pub struct MockChain {
    inner: Arc<Mutex<MockChainState>>,
}

#[derive(Debug)]
struct MockChainState {
    params: ChainParams,
    txs: Vec<ChainTransaction>,
    height: u64,
    latest: Option<BlockHeader>,
    subscribers: Vec<mpsc::UnboundedSender<BlockHeader>>,
    failing_connects: u32,
    fetch_failures: HashMap<u64, u32>,
    fetch_log: Vec<u64>,
    connects: u32,
    endpoints: Vec<String>,
}

impl Default for MockChainState {
    fn default() -> Self {
        Self {
            params: ChainParams::new("mock-chain", HexBytes::from([0u8; 32])),
            txs: Vec::new(),
            height: 0,
            latest: None,
            subscribers: Vec::new(),
            failing_connects: 0,
            fetch_failures: HashMap::new(),
            fetch_log: Vec::new(),
            connects: 0,
            endpoints: Vec::new(),
        }
    }
}

impl MockChainState {
    fn broadcast(&mut self, header: &BlockHeader) {
        self.subscribers.retain(|s| s.send(header.clone()).is_ok());
    }
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `n` transactions to the log without committing a block.
    fn push_transactions(&self, n: u64) -> Range<u64> {
        let mut state = self.inner.lock();
        let start = state.txs.len() as u64;
        state.txs.extend((start..start + n).map(make_tx));
        start..start + n
    }

    /// Commits a block over the current log and notifies subscribers.
    pub fn commit_block(&self) -> BlockHeader {
        let mut state = self.inner.lock();
        state.height += 1;
        let header = BlockHeader::new(
            state.height,
            1_700_000_000 + state.height,
            HexBytes::from(state.height.to_be_bytes()),
            state.txs.len() as u64,
        );
        state.latest = Some(header.clone());
        state.broadcast(&header);
        header
    }

    /// Appends `n` transactions and commits a block with them.
    pub fn produce_block(&self, n: u64) -> BlockHeader {
        self.push_transactions(n);
        self.commit_block()
    }

    /// Sends an arbitrary header to subscribers, ie. a duplicate or a
    /// rollback.
    pub fn send_header(&self, header: BlockHeader) {
        self.inner.lock().broadcast(&header);
    }

    /// Ends every live header subscription, as if the connection dropped.
    pub fn drop_subscriptions(&self) {
        self.inner.lock().subscribers.clear();
    }

    pub fn set_params(&self, params: ChainParams) {
        self.inner.lock().params = params;
    }

    /// Makes the next `n` connection attempts fail.
    pub fn fail_next_connects(&self, n: u32) {
        self.inner.lock().failing_connects = n;
    }

    /// Makes the next `times` fetches of `index` fail.
    pub fn fail_fetch(&self, index: u64, times: u32) {
        self.inner.lock().fetch_failures.insert(index, times);
    }

    pub fn tx_count(&self) -> u64 {
        self.inner.lock().txs.len() as u64
    }

    pub fn height(&self) -> u64 {
        self.inner.lock().height
    }

    /// Indices of every fetch attempt, in order, including failed ones.
    pub fn fetch_log(&self) -> Vec<u64> {
        self.inner.lock().fetch_log.clone()
    }

    pub fn clear_fetch_log(&self) {
        self.inner.lock().fetch_log.clear();
    }

    /// Number of successful connections so far.
    pub fn connect_count(&self) -> u32 {
        self.inner.lock().connects
    }

    pub fn endpoints(&self) -> Vec<String> {
        self.inner.lock().endpoints.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

#[async_trait]
impl ChainService for MockChain {
    type Session = MockSession;

    async fn connect(&self, endpoint: &str) -> Result<Self::Session, ChainClientError> {
        let mut state = self.inner.lock();
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(ChainClientError::Connect(format!(
                "injected connect failure to {endpoint}"
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        state.subscribers.push(tx);
        state.connects += 1;
        state.endpoints.push(endpoint.to_owned());

        Ok(MockSession {
            chain: self.clone(),
            headers: rx,
        })
    }
}

#[derive(Debug)]
pub struct MockSession {
    chain: MockChain,
    headers: mpsc::UnboundedReceiver<BlockHeader>,
}

#[async_trait]
impl ChainSession for MockSession {
    async fn chain_params(&self) -> Result<ChainParams, ChainClientError> {
        Ok(self.chain.inner.lock().params.clone())
    }

    async fn next_header(&mut self) -> Result<Option<BlockHeader>, ChainClientError> {
        Ok(self.headers.recv().await)
    }

    async fn latest_header(&self) -> Result<Option<BlockHeader>, ChainClientError> {
        Ok(self.chain.inner.lock().latest.clone())
    }

    async fn get_transaction_count(&self) -> Result<u64, ChainClientError> {
        let state = self.chain.inner.lock();
        Ok(state.latest.as_ref().map_or(0, |h| h.tx_count_at_height))
    }

    async fn get_transaction(&self, index: u64) -> Result<ChainTransaction, ChainClientError> {
        let mut state = self.chain.inner.lock();
        state.fetch_log.push(index);

        if let Some(remaining) = state.fetch_failures.get_mut(&index) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ChainClientError::Network(format!(
                    "injected fetch failure at {index}"
                )));
            }
        }

        state
            .txs
            .get(index as usize)
            .cloned()
            .ok_or(ChainClientError::MissingTransaction(index))
    }
}
