use std::fmt;

use alloy::primitives::{Address, B256, U256};

/// Storage-assigned market identifier.
pub type MarketId = u64;

/// Asset id of the collateral token in fill events. Exactly one side of a
/// well-formed fill carries it.
pub const COLLATERAL_ASSET_ID: U256 = U256::ZERO;

/// Sync cursor key for the trade scan.
pub const TRADE_SYNC_KEY: &str = "trade_sync";

/// The two outcome-token ids derived for a binary market.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenIds {
    pub yes: U256,
    pub no: U256,
}

/// Which asset the maker supplied: `Buy` when the maker supplied collateral,
/// `Sell` when the maker supplied outcome tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome slot a traded token represents, resolved against a market's
/// derived token ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    Yes,
    No,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Yes => "YES",
            Outcome::No => "NO",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolution parameters of a binary market. Created once at discovery time
/// and consumed read-only by the indexer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarketParams {
    pub condition_id: B256,
    pub question_id: B256,
    pub oracle: Address,
    pub collateral_token: Address,
    pub yes_token_id: U256,
    pub no_token_id: U256,
}

/// A market as stored, with its storage id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarketRecord {
    pub id: MarketId,
    pub params: MarketParams,
}

/// Persisted scan cursor. The sole source of truth for resumption; progress
/// is never re-derived from the trade table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncState {
    pub key: String,
    pub last_block: u64,
    /// Unix seconds of the last cursor update.
    pub updated_at: u64,
}

/// Snapshot of scan progress against the chain head.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexerStatus {
    pub last_block: u64,
    pub current_block: u64,
}

/// Ingestion counters for observability.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexerStats {
    pub total_trades: u64,
    pub trades_today: u64,
    /// Unix seconds of the last sync-state update, if any.
    pub last_sync: Option<u64>,
}
