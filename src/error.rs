use std::fmt::Display;

use alloy::{
    primitives::{TxHash, U256},
    sol_types, transports,
};

/// Error raised while decoding or indexing on-chain trade activity.
///
/// Transport-level variants are transient and retried at batch granularity by
/// the indexer; the data-integrity variants (`InvalidAssetPair`,
/// `ZeroTokenAmount`, `UnknownToken`) are per-fill conditions that drop the
/// offending fill without aborting the batch.
#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unexpected empty RPC response")]
    NullResp,

    #[error("log decode error: {0}")]
    Decode(String),

    #[error("neither asset of fill {0}:{1} is the collateral asset")]
    InvalidAssetPair(TxHash, u64),

    #[error("zero outcome-token amount in fill {0}:{1}")]
    ZeroTokenAmount(TxHash, u64),

    #[error("price of fill {0}:{1} does not fit the collateral precision range")]
    PriceOverflow(TxHash, u64),

    #[error("token id {0} matches neither outcome of the market")]
    UnknownToken(U256),

    #[error("transaction receipt not found: {0}")]
    ReceiptNotFound(TxHash),

    #[error("block {0} not found")]
    BlockNotFound(u64),

    #[error("store error: {0}")]
    Store(String),
}

impl<E: Display> From<transports::RpcError<E>> for IndexerError {
    fn from(value: transports::RpcError<E>) -> Self {
        match value {
            transports::RpcError::ErrorResp(ref resp) => {
                let msg = resp.message.to_ascii_lowercase();
                if (resp.code == -32600 || resp.code == -32601 || resp.code == -32602)
                    && (msg.contains("invalid") || msg.contains("not found"))
                {
                    Self::InvalidRequest(msg)
                } else {
                    Self::Transport(value.to_string())
                }
            }
            transports::RpcError::NullResp => Self::NullResp,
            _ => Self::Transport(value.to_string()),
        }
    }
}

impl From<sol_types::Error> for IndexerError {
    fn from(value: sol_types::Error) -> Self {
        Self::Decode(value.to_string())
    }
}
