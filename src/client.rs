//! Read-only chain access boundary.
//!
//! The indexer never submits transactions; everything it needs from the
//! chain fits in four read calls. [`RpcChain`] adapts any alloy [`Provider`]
//! to the boundary; [`crate::testing::FakeChain`] provides an in-memory
//! implementation for tests.

use std::future::Future;

use alloy::{
    eips::BlockId,
    primitives::{Address, B256, TxHash},
    providers::Provider,
    rpc::types::{Filter, Log},
};

use crate::error::IndexerError;

/// Narrow read-only view of the chain consumed by the decode pipeline.
pub trait ChainClient: Send + Sync {
    /// Logs matching `topic0` from any of `addresses` within
    /// `[from_block, to_block]` inclusive, in block-then-log-index order.
    fn logs(
        &self,
        addresses: &[Address],
        topic0: B256,
        from_block: u64,
        to_block: u64,
    ) -> impl Future<Output = Result<Vec<Log>, IndexerError>> + Send;

    /// Logs of a mined transaction's receipt, or `None` if the transaction
    /// is unknown.
    fn receipt_logs(
        &self,
        tx_hash: TxHash,
    ) -> impl Future<Output = Result<Option<Vec<Log>>, IndexerError>> + Send;

    /// Timestamp of a block, or `None` if the block is unknown.
    fn block_timestamp(
        &self,
        number: u64,
    ) -> impl Future<Output = Result<Option<u64>, IndexerError>> + Send;

    /// Current chain head height.
    fn block_number(&self) -> impl Future<Output = Result<u64, IndexerError>> + Send;
}

/// [`ChainClient`] over an RPC provider.
///
/// It is recommended to set up the provider with
/// [`alloy::transports::layers::RetryBackoffLayer`]; the indexer tolerates
/// transient failures either way via its own batch-level retry.
#[derive(Clone, Debug)]
pub struct RpcChain<P> {
    provider: P,
}

impl<P: Provider> RpcChain<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: Provider + Send + Sync> ChainClient for RpcChain<P> {
    async fn logs(
        &self,
        addresses: &[Address],
        topic0: B256,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Log>, IndexerError> {
        let filter = Filter::new()
            .address(addresses.to_vec())
            .event_signature(topic0)
            .from_block(from_block)
            .to_block(to_block);
        Ok(self.provider.get_logs(&filter).await?)
    }

    async fn receipt_logs(&self, tx_hash: TxHash) -> Result<Option<Vec<Log>>, IndexerError> {
        let receipt = self.provider.get_transaction_receipt(tx_hash).await?;
        Ok(receipt.map(|r| r.inner.logs().to_vec()))
    }

    async fn block_timestamp(&self, number: u64) -> Result<Option<u64>, IndexerError> {
        let block = self.provider.get_block(BlockId::number(number)).await?;
        Ok(block.map(|b| b.into_header().timestamp))
    }

    async fn block_number(&self) -> Result<u64, IndexerError> {
        Ok(self.provider.get_block_number().await?)
    }
}
