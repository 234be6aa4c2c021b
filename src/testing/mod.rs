//! In-memory testing environment.
//!
//! [`FakeChain`] implements [`ChainClient`] over hand-seeded logs with
//! `eth_getLogs`-style filter semantics, and [`MemoryStore`] implements
//! [`TradeStore`] with the same `(tx_hash, log_index)` uniqueness contract a
//! database deployment would enforce. Together they run the full indexing
//! pipeline without a node.
//!
//! [`fill_log`] builds an RPC-shaped `OrderFilled` log from event fields.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use alloy::{
    primitives::{Address, B256, TxHash, U256},
    rpc::types::Log,
    sol_types::SolEvent,
};
use dashmap::{DashMap, mapref::entry::Entry};
use itertools::Itertools;

use crate::{
    abi::exchange::OrderFilled,
    client::ChainClient,
    error::IndexerError,
    store::{self, TradeRow, TradeStore},
    types::{MarketId, MarketParams, MarketRecord, SyncState},
};

/// Fallback timestamp base for blocks with no explicit timestamp.
const GENESIS_TS: u64 = 1_700_000_000;

/// Build an RPC-shaped log as an exchange contract would emit it.
pub fn fill_log(
    block_number: u64,
    tx_hash: TxHash,
    log_index: u64,
    exchange: Address,
    event: &OrderFilled,
) -> Log {
    Log {
        inner: alloy::primitives::Log {
            address: exchange,
            data: event.encode_log_data(),
        },
        block_number: Some(block_number),
        transaction_hash: Some(tx_hash),
        log_index: Some(log_index),
        ..Default::default()
    }
}

#[derive(Debug, Default)]
struct ChainInner {
    head: AtomicU64,
    logs: DashMap<u64, Vec<Log>>,
    timestamps: DashMap<u64, u64>,
    receipts: DashMap<TxHash, Vec<Log>>,
    log_failures: AtomicU64,
    timestamp_failures: AtomicU64,
}

fn take_failure(counter: &AtomicU64) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// In-memory chain. Cloning shares the underlying state.
#[derive(Clone, Debug, Default)]
pub struct FakeChain {
    inner: Arc<ChainInner>,
}

impl FakeChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_head(&self, number: u64) {
        self.inner.head.store(number, Ordering::SeqCst);
    }

    pub fn set_timestamp(&self, number: u64, timestamp: u64) {
        self.inner.timestamps.insert(number, timestamp);
    }

    /// Seed a raw log into both the block index and its transaction receipt.
    /// Advances the head to the log's block if it is ahead.
    pub fn push_log(&self, log: Log) {
        if let Some(number) = log.block_number {
            self.inner.head.fetch_max(number, Ordering::SeqCst);
            self.inner.logs.entry(number).or_default().push(log.clone());
        }
        if let Some(tx_hash) = log.transaction_hash {
            self.inner.receipts.entry(tx_hash).or_default().push(log);
        }
    }

    /// Make the next `count` log queries fail with a transport error.
    pub fn fail_log_queries(&self, count: u64) {
        self.inner.log_failures.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` timestamp queries fail with a transport error.
    pub fn fail_timestamp_queries(&self, count: u64) {
        self.inner.timestamp_failures.store(count, Ordering::SeqCst);
    }

    /// Seed an `OrderFilled` emission.
    pub fn push_fill(
        &self,
        block_number: u64,
        tx_hash: TxHash,
        log_index: u64,
        exchange: Address,
        event: &OrderFilled,
    ) {
        self.push_log(fill_log(block_number, tx_hash, log_index, exchange, event));
    }
}

impl ChainClient for FakeChain {
    async fn logs(
        &self,
        addresses: &[Address],
        topic0: B256,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Log>, IndexerError> {
        if take_failure(&self.inner.log_failures) {
            return Err(IndexerError::Transport("injected log query failure".to_string()));
        }
        let mut logs: Vec<Log> = (from_block..=to_block)
            .filter_map(|number| self.inner.logs.get(&number))
            .flat_map(|entry| entry.value().clone())
            .filter(|log| {
                addresses.contains(&log.inner.address)
                    && log.inner.data.topics().first() == Some(&topic0)
            })
            .collect();
        logs.sort_by_key(|log| (log.block_number, log.log_index));
        Ok(logs)
    }

    async fn receipt_logs(&self, tx_hash: TxHash) -> Result<Option<Vec<Log>>, IndexerError> {
        Ok(self
            .inner
            .receipts
            .get(&tx_hash)
            .map(|entry| entry.value().clone()))
    }

    async fn block_timestamp(&self, number: u64) -> Result<Option<u64>, IndexerError> {
        if take_failure(&self.inner.timestamp_failures) {
            return Err(IndexerError::Transport(
                "injected timestamp query failure".to_string(),
            ));
        }
        if let Some(ts) = self.inner.timestamps.get(&number) {
            return Ok(Some(*ts));
        }
        // Mined blocks without an explicit timestamp get a synthetic one.
        if number <= self.inner.head.load(Ordering::SeqCst) {
            return Ok(Some(GENESIS_TS + number * 2));
        }
        Ok(None)
    }

    async fn block_number(&self) -> Result<u64, IndexerError> {
        Ok(self.inner.head.load(Ordering::SeqCst))
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    next_market_id: AtomicU64,
    markets: DashMap<MarketId, MarketRecord>,
    trades: DashMap<(TxHash, u64), TradeRow>,
    sync: DashMap<String, SyncState>,
    insert_failures: AtomicU64,
}

/// In-memory store. Cloning shares the underlying state.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronous market seeding for test setup.
    pub fn add_market(&self, params: MarketParams) -> MarketRecord {
        let id = self.inner.next_market_id.fetch_add(1, Ordering::SeqCst) + 1;
        let record = MarketRecord { id, params };
        self.inner.markets.insert(id, record.clone());
        record
    }

    /// Make the next `count` trade inserts fail with a store error.
    pub fn fail_trade_inserts(&self, count: u64) {
        self.inner.insert_failures.store(count, Ordering::SeqCst);
    }

    /// All persisted trades, ordered by `(block_number, log_index)`.
    pub fn trades(&self) -> Vec<TradeRow> {
        self.inner
            .trades
            .iter()
            .map(|entry| entry.value().clone())
            .sorted_by_key(|row| (row.fill.block_number, row.fill.log_index))
            .collect()
    }
}

impl TradeStore for MemoryStore {
    async fn find_market_by_token_id(
        &self,
        token_id: U256,
    ) -> Result<Option<MarketRecord>, IndexerError> {
        Ok(self
            .inner
            .markets
            .iter()
            .find(|entry| {
                entry.params.yes_token_id == token_id || entry.params.no_token_id == token_id
            })
            .map(|entry| entry.value().clone()))
    }

    async fn insert_market(&self, params: MarketParams) -> Result<MarketRecord, IndexerError> {
        Ok(self.add_market(params))
    }

    async fn insert_trade_if_absent(&self, row: &TradeRow) -> Result<bool, IndexerError> {
        if take_failure(&self.inner.insert_failures) {
            return Err(IndexerError::Store("injected insert failure".to_string()));
        }
        match self
            .inner
            .trades
            .entry((row.fill.tx_hash, row.fill.log_index))
        {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(vacant) => {
                vacant.insert(row.clone());
                Ok(true)
            }
        }
    }

    async fn sync_state(&self, key: &str) -> Result<Option<SyncState>, IndexerError> {
        Ok(self.inner.sync.get(key).map(|entry| entry.value().clone()))
    }

    async fn upsert_sync_state(&self, key: &str, last_block: u64) -> Result<(), IndexerError> {
        self.inner.sync.insert(
            key.to_string(),
            SyncState {
                key: key.to_string(),
                last_block,
                updated_at: store::unix_now(),
            },
        );
        Ok(())
    }

    async fn trade_count(&self) -> Result<u64, IndexerError> {
        Ok(self.inner.trades.len() as u64)
    }

    async fn trade_count_since(&self, unix_ts: u64) -> Result<u64, IndexerError> {
        Ok(self
            .inner
            .trades
            .iter()
            .filter(|entry| entry.created_at >= unix_ts)
            .count() as u64)
    }
}
