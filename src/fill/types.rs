//! Fill data structures.

use alloy::primitives::{Address, B256, TxHash, U256};
use fastnum::UD64;

use crate::types::Side;

/// One matched fill, normalized from an `OrderFilled` log.
///
/// Exactly one of `maker_asset_id`/`taker_asset_id` is the collateral asset;
/// that side determines [`Side`], the traded `token_id`, and the price.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedFill {
    /// Transaction hash the fill occurred in.
    pub tx_hash: TxHash,

    /// Log index within the block. Together with `tx_hash` this uniquely
    /// identifies the fill in storage.
    pub log_index: u64,

    /// Block the fill was mined in.
    pub block_number: u64,

    /// Exchange contract that emitted the log.
    pub exchange: Address,

    /// Hash of the maker order that was filled.
    pub order_hash: B256,

    pub maker: Address,
    pub taker: Address,

    pub maker_asset_id: U256,
    pub taker_asset_id: U256,

    /// Raw fixed-point amount the maker supplied.
    pub maker_amount: U256,

    /// Raw fixed-point amount the taker supplied.
    pub taker_amount: U256,

    /// Raw fee, denominated in collateral.
    pub fee: U256,

    /// Collateral paid per outcome token, normalized to collateral precision.
    pub price: UD64,

    /// Raw outcome-token amount exchanged.
    pub size: U256,

    /// The non-collateral asset id (a YES or NO token of some market).
    pub token_id: U256,

    pub side: Side,
}

impl DecodedFill {
    /// Fills whose taker is the emitting exchange itself are internal
    /// transfers, not user trades, and never reach storage.
    pub fn is_internal(&self) -> bool {
        self.taker == self.exchange
    }
}
