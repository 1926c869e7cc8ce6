//! [`ChainService`] over a JSON-RPC websocket connection.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use futures::StreamExt;
use goliath_primitives::prelude::*;
use jsonrpsee::{
    core::{client::Subscription, ClientError},
    ws_client::{WsClient, WsClientBuilder},
};
use tracing::*;

use crate::{ChainClientError, ChainService, ChainSession};

mod api;

pub use api::SequencerChainApiClient;

/// Default timeout for a single request.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for establishing the websocket connection.
const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Connects to the chain service over websockets.
#[derive(Clone, Debug)]
pub struct RpcChainService {
    request_timeout: Duration,
    connection_timeout: Duration,
}

impl RpcChainService {
    pub fn new(request_timeout: Duration, connection_timeout: Duration) -> Self {
        Self {
            request_timeout,
            connection_timeout,
        }
    }
}

impl Default for RpcChainService {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT, DEFAULT_CONNECTION_TIMEOUT)
    }
}

#[async_trait]
impl ChainService for RpcChainService {
    type Session = RpcSession;

    async fn connect(&self, endpoint: &str) -> Result<Self::Session, ChainClientError> {
        debug!(%endpoint, "connecting to chain service");
        let client = WsClientBuilder::default()
            .request_timeout(self.request_timeout)
            .connection_timeout(self.connection_timeout)
            .build(endpoint)
            .await
            .map_err(|e| ChainClientError::Connect(e.to_string()))?;

        let headers = client
            .subscribe_headers()
            .await
            .map_err(|e| ChainClientError::Connect(e.to_string()))?;

        Ok(RpcSession { client, headers })
    }
}

pub struct RpcSession {
    client: WsClient,
    headers: Subscription<BlockHeader>,
}

impl fmt::Debug for RpcSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcSession")
            .field("connected", &self.client.is_connected())
            .finish_non_exhaustive()
    }
}

/// Only transport failures lose the session. An error response to one
/// request leaves the connection usable.
fn rpc_err(e: ClientError) -> ChainClientError {
    match e {
        ClientError::Call(err) => ChainClientError::Rejected(err.to_string()),
        ClientError::ParseError(err) => ChainClientError::Malformed(err.to_string()),
        other => ChainClientError::Network(other.to_string()),
    }
}

#[async_trait]
impl ChainSession for RpcSession {
    async fn chain_params(&self) -> Result<ChainParams, ChainClientError> {
        self.client.chain_params().await.map_err(rpc_err)
    }

    async fn next_header(&mut self) -> Result<Option<BlockHeader>, ChainClientError> {
        match StreamExt::next(&mut self.headers).await {
            Some(Ok(header)) => Ok(Some(header)),
            Some(Err(e)) => Err(ChainClientError::Malformed(e.to_string())),
            None => {
                debug!("header subscription closed");
                Ok(None)
            }
        }
    }

    async fn latest_header(&self) -> Result<Option<BlockHeader>, ChainClientError> {
        self.client.latest_header().await.map_err(rpc_err)
    }

    async fn get_transaction_count(&self) -> Result<u64, ChainClientError> {
        self.client.tx_count().await.map_err(rpc_err)
    }

    async fn get_transaction(&self, index: u64) -> Result<ChainTransaction, ChainClientError> {
        self.client
            .get_transaction(index)
            .await
            .map_err(rpc_err)?
            .ok_or(ChainClientError::MissingTransaction(index))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use jsonrpsee::{
        core::{RpcResult, SubscriptionResult},
        server::{PendingSubscriptionSink, ServerBuilder, ServerHandle, SubscriptionMessage},
        types::ErrorObjectOwned,
    };

    use super::{api::SequencerChainApiServer, *};

    /// Index the server answers with an error response.
    const REJECTED_INDEX: u64 = 99;

    struct StaticChain {
        params: ChainParams,
        txs: Vec<ChainTransaction>,
        headers: Vec<BlockHeader>,
    }

    impl StaticChain {
        fn new() -> Self {
            let txs = (0..3)
                .map(|i| {
                    ChainTransaction::new(
                        i,
                        HexBytes::from(i.to_be_bytes()),
                        HexBytes::new(format!("tx-{i}").into_bytes()),
                        0,
                    )
                })
                .collect();
            let headers = vec![
                BlockHeader::new(1, 1_700_000_001, HexBytes::from([1u8; 32]), 2),
                BlockHeader::new(2, 1_700_000_002, HexBytes::from([2u8; 32]), 3),
            ];

            Self {
                params: ChainParams::new("rpc-chain", HexBytes::from([7u8; 32])),
                txs,
                headers,
            }
        }
    }

    #[async_trait]
    impl SequencerChainApiServer for StaticChain {
        async fn chain_params(&self) -> RpcResult<ChainParams> {
            Ok(self.params.clone())
        }

        async fn latest_header(&self) -> RpcResult<Option<BlockHeader>> {
            Ok(self.headers.last().cloned())
        }

        async fn tx_count(&self) -> RpcResult<u64> {
            Ok(self.txs.len() as u64)
        }

        async fn get_transaction(&self, index: u64) -> RpcResult<Option<ChainTransaction>> {
            if index == REJECTED_INDEX {
                return Err(ErrorObjectOwned::owned::<()>(
                    -32602,
                    "index out of range",
                    None,
                ));
            }
            Ok(self.txs.get(index as usize).cloned())
        }

        async fn subscribe_headers(&self, pending: PendingSubscriptionSink) -> SubscriptionResult {
            let sink = pending.accept().await?;
            for header in &self.headers {
                sink.send(SubscriptionMessage::from_json(header)?).await?;
            }
            sink.closed().await;
            Ok(())
        }
    }

    async fn start_server() -> (String, ServerHandle) {
        let server = ServerBuilder::new().build("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();
        let handle = server.start(StaticChain::new().into_rpc());
        (format!("ws://{addr}"), handle)
    }

    async fn next_header(session: &mut RpcSession) -> Option<BlockHeader> {
        tokio::time::timeout(Duration::from_secs(5), session.next_header())
            .await
            .expect("header stream hung")
            .expect("header stream failed")
    }

    #[tokio::test]
    async fn test_session_roundtrip() {
        let (endpoint, _handle) = start_server().await;
        let session = RpcChainService::default().connect(&endpoint).await.unwrap();

        let params = session.chain_params().await.unwrap();
        assert_eq!(params.chain_id, "rpc-chain");
        assert_eq!(session.get_transaction_count().await.unwrap(), 3);
        assert_eq!(
            session.latest_header().await.unwrap().map(|h| h.height),
            Some(2)
        );

        let tx = session.get_transaction(1).await.unwrap();
        assert_eq!(tx.sequence_index, 1);
        assert_eq!(tx.payload.as_slice(), b"tx-1");

        assert_eq!(
            session.get_transaction(5).await.unwrap_err(),
            ChainClientError::MissingTransaction(5)
        );
    }

    #[tokio::test]
    async fn test_headers_in_order_then_closed() {
        let (endpoint, handle) = start_server().await;
        let mut session = RpcChainService::default().connect(&endpoint).await.unwrap();

        let first = next_header(&mut session).await.unwrap();
        let second = next_header(&mut session).await.unwrap();
        assert_eq!((first.height, first.tx_count_at_height), (1, 2));
        assert_eq!((second.height, second.tx_count_at_height), (2, 3));
        assert_eq!(second.commit_hash, HexBytes::from([2u8; 32]));

        handle.stop().unwrap();
        handle.stopped().await;
        assert_eq!(next_header(&mut session).await, None);
    }

    #[tokio::test]
    async fn test_rejected_request_keeps_session() {
        let (endpoint, _handle) = start_server().await;
        let session = RpcChainService::default().connect(&endpoint).await.unwrap();

        let err = session.get_transaction(REJECTED_INDEX).await.unwrap_err();
        assert!(matches!(err, ChainClientError::Rejected(_)), "unexpected {err:?}");
        assert!(!err.is_session_lost());

        // Same connection still answers.
        assert_eq!(session.get_transaction(0).await.unwrap().sequence_index, 0);
    }

    #[tokio::test]
    async fn test_connect_unreachable() {
        let service = RpcChainService::new(Duration::from_secs(1), Duration::from_secs(1));
        let err = service.connect("ws://127.0.0.1:1").await.unwrap_err();
        assert!(matches!(err, ChainClientError::Connect(_)), "unexpected {err:?}");
        assert!(err.is_session_lost());
    }
}
