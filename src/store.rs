//! Persistence boundary.
//!
//! The indexer consumes storage through [`TradeStore`] only. The
//! `(tx_hash, log_index)` uniqueness contract of
//! [`TradeStore::insert_trade_if_absent`] is the sole cross-run consistency
//! mechanism: batch re-processing after a crash must not rely on any
//! in-memory deduplication.
//!
//! [`crate::testing::MemoryStore`] implements the boundary in memory; a real
//! deployment backs it with a database owned by the surrounding service.

use std::{
    future::Future,
    time::{SystemTime, UNIX_EPOCH},
};

use alloy::primitives::U256;

use crate::{
    error::IndexerError,
    fill::DecodedFill,
    types::{MarketId, MarketParams, MarketRecord, Outcome, SyncState},
};

/// A trade as persisted: the decoded fill plus its resolution context.
///
/// Uniquely keyed by `(fill.tx_hash, fill.log_index)`.
#[derive(Clone, Debug)]
pub struct TradeRow {
    pub market_id: MarketId,
    pub block_timestamp: u64,
    pub outcome: Outcome,
    /// Unix seconds the row was first written.
    pub created_at: u64,
    pub fill: DecodedFill,
}

impl TradeRow {
    pub fn new(market_id: MarketId, block_timestamp: u64, outcome: Outcome, fill: DecodedFill) -> Self {
        Self {
            market_id,
            block_timestamp,
            outcome,
            created_at: unix_now(),
            fill,
        }
    }
}

/// Storage consumed by the indexer.
pub trait TradeStore: Send + Sync {
    /// Market whose YES or NO token id equals `token_id`, if any.
    fn find_market_by_token_id(
        &self,
        token_id: U256,
    ) -> impl Future<Output = Result<Option<MarketRecord>, IndexerError>> + Send;

    /// Seed a market record. Called by the discovery collaborator, not by
    /// the indexer itself.
    fn insert_market(
        &self,
        params: MarketParams,
    ) -> impl Future<Output = Result<MarketRecord, IndexerError>> + Send;

    /// Insert a trade unless a row with the same `(tx_hash, log_index)`
    /// already exists. Returns whether the row was inserted; a collision is
    /// a no-op, not an error.
    fn insert_trade_if_absent(
        &self,
        row: &TradeRow,
    ) -> impl Future<Output = Result<bool, IndexerError>> + Send;

    fn sync_state(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<SyncState>, IndexerError>> + Send;

    fn upsert_sync_state(
        &self,
        key: &str,
        last_block: u64,
    ) -> impl Future<Output = Result<(), IndexerError>> + Send;

    fn trade_count(&self) -> impl Future<Output = Result<u64, IndexerError>> + Send;

    /// Number of trades first written at or after the given unix second.
    fn trade_count_since(
        &self,
        unix_ts: u64,
    ) -> impl Future<Output = Result<u64, IndexerError>> + Send;
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
