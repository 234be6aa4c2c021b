//! Prediction-market trade indexer.
//!
//! # Overview
//!
//! Ingests `OrderFilled` event logs emitted by a conditional-token exchange
//! and turns them into a deduplicated, resumable trade ledger.
//!
//! Use [`market::MarketDecoder`] to derive YES/NO outcome-token ids from a
//! market's condition id, [`fill::FillDecoder`] to scan block ranges for fill
//! events and decode them into normalized [`fill::DecodedFill`] records, and
//! [`indexer::TradeIndexer`] to drive the continuous, checkpointed scan that
//! resolves each fill to a known market and persists it exactly once.
//!
//! The chain is consumed read-only through the [`client::ChainClient`] trait
//! ([`client::RpcChain`] adapts any alloy provider); storage is consumed
//! through [`store::TradeStore`]. Market discovery and the query API live
//! outside this crate and interact only through those boundaries.
//!
//! See `./tests` for end-to-end examples against the in-memory environment.
//!
//! # Limitations/follow-ups
//!
//! * Log polling only; no WebSocket subscriptions.
//!
//! * No chain-reorganization compensation. The `(tx_hash, log_index)`
//!   uniqueness constraint makes re-processing safe, but a replaced block is
//!   not detected. A confirmation-depth buffer could be layered on top.
//!
//! # Testing
//!
//! [`testing`] module provides an in-memory chain and store implementing the
//! two consumed boundaries.

pub mod abi;
pub mod client;
pub mod error;
pub mod fill;
pub mod indexer;
pub mod market;
pub mod num;
pub mod store;
pub mod testing;
pub mod types;

use alloy::primitives::{Address, address};

/// Deployment the indexer is operating against.
#[derive(Clone, Debug)]
pub struct Chain {
    chain_id: u64,
    collateral_token: Address,
    collateral_decimals: u8,
    exchanges: Vec<Address>,
}

impl Chain {
    /// Polygon mainnet reference deployment: USDC.e collateral, the CTF
    /// Exchange and the NegRisk CTF Exchange.
    pub fn polygon() -> Self {
        Self {
            chain_id: 137,
            collateral_token: address!("0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174"),
            collateral_decimals: 6,
            exchanges: vec![
                address!("0x4bFb41d5B3570DeFd03C39a9A4D8dE6Bd8B8982E"),
                address!("0xC5d563A36AE78145C45a50134d48A1215220f80a"),
            ],
        }
    }

    pub fn custom(
        chain_id: u64,
        collateral_token: Address,
        collateral_decimals: u8,
        exchanges: Vec<Address>,
    ) -> Self {
        Self {
            chain_id,
            collateral_token,
            collateral_decimals,
            exchanges,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn collateral_token(&self) -> Address {
        self.collateral_token
    }

    pub fn collateral_decimals(&self) -> u8 {
        self.collateral_decimals
    }

    /// Exchange contract allow-list. Logs from any other address are never
    /// considered.
    pub fn exchanges(&self) -> &[Address] {
        &self.exchanges
    }

    pub fn is_exchange(&self, address: Address) -> bool {
        self.exchanges.contains(&address)
    }
}
