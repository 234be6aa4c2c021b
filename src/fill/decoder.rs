//! Fill decoder implementation.

use alloy::{primitives::TxHash, rpc::types::Log, sol_types::SolEvent};
use tracing::{debug, error};

use super::types::DecodedFill;
use crate::{
    Chain,
    abi::exchange::OrderFilled,
    client::ChainClient,
    error::IndexerError,
    num,
    types::{COLLATERAL_ASSET_ID, Side},
};

/// Decodes `OrderFilled` logs from the configured exchange contracts into
/// normalized [`DecodedFill`] records.
pub struct FillDecoder<C> {
    chain: Chain,
    client: C,
    collateral: num::Converter,
}

impl<C: ChainClient> FillDecoder<C> {
    pub fn new(chain: Chain, client: C) -> Self {
        let collateral = num::Converter::new(chain.collateral_decimals());
        Self {
            chain,
            client,
            collateral,
        }
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    /// Scan `[from_block, to_block]` inclusive for fills.
    ///
    /// Logs that fail to decode are dropped with an error log; the rest of
    /// the range still decodes. Internal transfers never appear in the
    /// output.
    pub async fn scan_blocks(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<DecodedFill>, IndexerError> {
        let logs = self
            .client
            .logs(
                self.chain.exchanges(),
                OrderFilled::SIGNATURE_HASH,
                from_block,
                to_block,
            )
            .await?;
        debug!(from_block, to_block, count = logs.len(), "fetched fill logs");

        let mut fills = Vec::with_capacity(logs.len());
        for log in &logs {
            match decode_fill(log, self.collateral) {
                Ok(fill) if fill.is_internal() => {
                    debug!(
                        tx_hash = %fill.tx_hash,
                        log_index = fill.log_index,
                        "skipping internal transfer (taker == exchange)"
                    );
                }
                Ok(fill) => fills.push(fill),
                Err(e) => {
                    error!(
                        %e,
                        block_number = log.block_number,
                        tx_hash = ?log.transaction_hash,
                        "dropping undecodable fill log"
                    );
                }
            }
        }
        Ok(fills)
    }

    /// Decode all fills of a single mined transaction. Spot-check variant of
    /// [`Self::scan_blocks`]; decode failures propagate here since the caller
    /// asked about this exact transaction.
    pub async fn decode_tx(&self, tx_hash: TxHash) -> Result<Vec<DecodedFill>, IndexerError> {
        let logs = self
            .client
            .receipt_logs(tx_hash)
            .await?
            .ok_or(IndexerError::ReceiptNotFound(tx_hash))?;

        let mut fills = Vec::new();
        for log in &logs {
            if !self.chain.is_exchange(log.inner.address)
                || log.inner.data.topics().first() != Some(&OrderFilled::SIGNATURE_HASH)
            {
                continue;
            }
            let fill = decode_fill(log, self.collateral)?;
            if !fill.is_internal() {
                fills.push(fill);
            }
        }
        Ok(fills)
    }

    /// Timestamp of a block. Errors if the block is unknown to the node.
    pub async fn block_timestamp(&self, number: u64) -> Result<u64, IndexerError> {
        self.client
            .block_timestamp(number)
            .await?
            .ok_or(IndexerError::BlockNotFound(number))
    }

    /// Current chain head height.
    pub async fn current_block(&self) -> Result<u64, IndexerError> {
        self.client.block_number().await
    }
}

/// Decode a single `OrderFilled` log into a normalized fill.
///
/// Side resolution: the fill side whose asset id is the collateral id is the
/// collateral leg; the other leg carries the traded outcome token. A fill
/// with no collateral leg is data corruption ([`IndexerError::InvalidAssetPair`]),
/// as is a zero outcome-token amount ([`IndexerError::ZeroTokenAmount`]) or a
/// price too wide for the collateral precision
/// ([`IndexerError::PriceOverflow`]). All are per-fill conditions; callers
/// drop the fill and keep going.
pub fn decode_fill(log: &Log, collateral: num::Converter) -> Result<DecodedFill, IndexerError> {
    let tx_hash = log.transaction_hash.unwrap_or_default();
    let log_index = log.log_index.unwrap_or_default();
    let block_number = log.block_number.unwrap_or_default();

    let event = OrderFilled::decode_log(&log.inner)?;
    let exchange = event.address;
    let e = &event.data;

    let (side, token_id, collateral_amount, token_amount) =
        if e.makerAssetId == COLLATERAL_ASSET_ID {
            // Maker supplies collateral, taker supplies outcome tokens.
            (
                Side::Buy,
                e.takerAssetId,
                e.makerAmountFilled,
                e.takerAmountFilled,
            )
        } else if e.takerAssetId == COLLATERAL_ASSET_ID {
            // Taker supplies collateral, maker supplies outcome tokens.
            (
                Side::Sell,
                e.makerAssetId,
                e.takerAmountFilled,
                e.makerAmountFilled,
            )
        } else {
            return Err(IndexerError::InvalidAssetPair(tx_hash, log_index));
        };

    if token_amount.is_zero() {
        return Err(IndexerError::ZeroTokenAmount(tx_hash, log_index));
    }
    let price = collateral
        .ratio(collateral_amount, token_amount)
        .ok_or(IndexerError::PriceOverflow(tx_hash, log_index))?;

    Ok(DecodedFill {
        tx_hash,
        log_index,
        block_number,
        exchange,
        order_hash: e.orderHash,
        maker: e.maker,
        taker: e.taker,
        maker_asset_id: e.makerAssetId,
        taker_asset_id: e.takerAssetId,
        maker_amount: e.makerAmountFilled,
        taker_amount: e.takerAmountFilled,
        fee: e.fee,
        price,
        size: token_amount,
        token_id,
        side,
    })
}
