//! Macro trait def for the `seq_` RPC namespace using jsonrpsee.
use goliath_primitives::prelude::*;
use jsonrpsee::{
    core::{RpcResult, SubscriptionResult},
    proc_macros::rpc,
};

#[cfg_attr(not(test), rpc(client, namespace = "seq"))]
#[cfg_attr(test, rpc(server, client, namespace = "seq"))]
pub trait SequencerChainApi {
    /// Chain id and genesis commitment.
    #[method(name = "chainParams")]
    async fn chain_params(&self) -> RpcResult<ChainParams>;

    /// Header of the latest committed block.
    #[method(name = "latestHeader")]
    async fn latest_header(&self) -> RpcResult<Option<BlockHeader>>;

    /// Number of transactions committed so far.
    #[method(name = "txCount")]
    async fn tx_count(&self) -> RpcResult<u64>;

    #[method(name = "getTransaction")]
    async fn get_transaction(&self, index: u64) -> RpcResult<Option<ChainTransaction>>;

    /// Header of every newly committed block.
    #[subscription(
        name = "subscribeHeaders" => "header",
        unsubscribe = "unsubscribeHeaders",
        item = BlockHeader
    )]
    async fn subscribe_headers(&self) -> SubscriptionResult;
}
