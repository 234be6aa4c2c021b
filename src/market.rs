//! Outcome-token derivation for binary markets.
//!
//! Implements the conditional-token scheme: a market's condition id is bound
//! to one outcome slot via a collection id, and the collection id is bound to
//! the collateral token to produce the tradable token id.
//!
//! ```text
//! collectionId = keccak256(abi.encode(parentCollectionId, conditionId, indexSet))
//! tokenId      = keccak256(abi.encode(collateralToken, collectionId))
//! ```
//!
//! Index sets are bitmasks over the two-outcome slot set: `0b01` for YES,
//! `0b10` for NO.

use alloy::{
    primitives::{Address, B256, U256, keccak256},
    sol_types::SolValue,
};
use tracing::warn;

use crate::{
    error::IndexerError,
    types::{MarketParams, Outcome, TokenIds},
};

const YES_INDEX_SET: u64 = 1;
const NO_INDEX_SET: u64 = 2;

/// Derives outcome-token ids for markets collateralized by a fixed token.
#[derive(Clone, Copy, Debug)]
pub struct MarketDecoder {
    collateral_token: Address,
}

impl MarketDecoder {
    pub fn new(collateral_token: Address) -> Self {
        Self { collateral_token }
    }

    /// Derive both outcome-token ids for a condition. Pure and deterministic.
    pub fn token_ids(&self, condition_id: B256) -> TokenIds {
        TokenIds {
            yes: self.token_id(collection_id(condition_id, YES_INDEX_SET)),
            no: self.token_id(collection_id(condition_id, NO_INDEX_SET)),
        }
    }

    fn token_id(&self, collection_id: B256) -> U256 {
        let hash = keccak256((self.collateral_token, collection_id).abi_encode());
        U256::from_be_bytes(hash.0)
    }

    /// Cross-check externally supplied token ids against the local
    /// derivation. A mismatch is logged and reported, never raised: discovery
    /// data stays authoritative for storage, the derivation is a sanity check.
    pub fn verify_token_ids(
        &self,
        condition_id: B256,
        external_yes: U256,
        external_no: U256,
    ) -> bool {
        let derived = self.token_ids(condition_id);
        let matches = derived.yes == external_yes && derived.no == external_no;
        if !matches {
            warn!(
                %condition_id,
                local_yes = %derived.yes,
                local_no = %derived.no,
                %external_yes,
                %external_no,
                "token id mismatch between local derivation and discovery data"
            );
        }
        matches
    }

    /// Build market parameters from discovery data, cross-checking the
    /// supplied token ids when present. The derived ids are stored.
    pub fn market_params(
        &self,
        condition_id: B256,
        question_id: B256,
        oracle: Address,
        external_ids: Option<TokenIds>,
    ) -> MarketParams {
        let derived = self.token_ids(condition_id);
        if let Some(external) = external_ids {
            self.verify_token_ids(condition_id, external.yes, external.no);
        }
        MarketParams {
            condition_id,
            question_id,
            oracle,
            collateral_token: self.collateral_token,
            yes_token_id: derived.yes,
            no_token_id: derived.no,
        }
    }
}

/// Collection id binding a condition to one outcome slot. The parent
/// collection is the root (zero) collection.
pub fn collection_id(condition_id: B256, index_set: u64) -> B256 {
    keccak256((B256::ZERO, condition_id, U256::from(index_set)).abi_encode())
}

/// Condition id from its resolution parameters, useful for verifying
/// discovery data against event logs.
pub fn condition_id(oracle: Address, question_id: B256, outcome_slot_count: u64) -> B256 {
    keccak256((oracle, question_id, U256::from(outcome_slot_count)).abi_encode())
}

/// Resolve which outcome a token id represents within a market.
///
/// Fails with [`IndexerError::UnknownToken`] when the id matches neither
/// token; callers treat this as "skip trade", not a fatal error.
pub fn determine_outcome(token_id: U256, market: &MarketParams) -> Result<Outcome, IndexerError> {
    if token_id == market.yes_token_id {
        Ok(Outcome::Yes)
    } else if token_id == market.no_token_id {
        Ok(Outcome::No)
    } else {
        Err(IndexerError::UnknownToken(token_id))
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{address, b256};

    use super::*;

    fn decoder() -> MarketDecoder {
        MarketDecoder::new(address!("0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174"))
    }

    const CONDITION: B256 =
        b256!("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa01");

    #[test]
    fn test_collection_id_vectors() {
        assert_eq!(
            collection_id(CONDITION, 1),
            b256!("0x600a48c7a2c3b83670e6216691d05cb0a7681c5b38615a6882f3d68403a511e3")
        );
        assert_eq!(
            collection_id(CONDITION, 2),
            b256!("0xffd2cc28fed1991b6371a904b505a8b6c33f580df5263a01ab93b0d956a553f5")
        );
    }

    #[test]
    fn test_token_id_vectors() {
        let ids = decoder().token_ids(CONDITION);
        assert_eq!(
            ids.yes,
            U256::from_be_bytes(
                b256!("0xd10ffa602d51efc5704f8787e82f43cfebfb6e2de722af5ad9387355332261a1").0
            )
        );
        assert_eq!(
            ids.no,
            U256::from_be_bytes(
                b256!("0x8fee8cc28bb9b37fd32cec6b99b1cc0271a023a64ca493b87b7e8f26198f35b5").0
            )
        );
    }

    #[test]
    fn test_token_ids_deterministic_and_distinct() {
        let first = decoder().token_ids(CONDITION);
        let second = decoder().token_ids(CONDITION);
        assert_eq!(first, second);
        assert_ne!(first.yes, first.no);
        assert_ne!(first.yes, U256::ZERO);
        assert_ne!(first.no, U256::ZERO);
    }

    #[test]
    fn test_condition_id_vector() {
        assert_eq!(
            condition_id(
                address!("0x5d7c6fb7a448b1a7928c804f2d3cae8b757c2c06"),
                b256!("0x1111111111111111111111111111111111111111111111111111111111111111"),
                2
            ),
            b256!("0xbc1422a2d0d3184ed9fb7da527d62006ce2761c0a3700d2890b9a0fb3337d384")
        );
    }

    #[test]
    fn test_verify_token_ids() {
        let d = decoder();
        let ids = d.token_ids(CONDITION);
        assert!(d.verify_token_ids(CONDITION, ids.yes, ids.no));
        assert!(!d.verify_token_ids(CONDITION, ids.no, ids.yes));
        assert!(!d.verify_token_ids(CONDITION, ids.yes, U256::from(1)));
    }

    #[test]
    fn test_market_params_uses_derived_ids() {
        let d = decoder();
        let oracle = address!("0x5d7c6fb7a448b1a7928c804f2d3cae8b757c2c06");
        let question = b256!("0x1111111111111111111111111111111111111111111111111111111111111111");
        let params = d.market_params(CONDITION, question, oracle, None);
        let ids = d.token_ids(CONDITION);
        assert_eq!(params.yes_token_id, ids.yes);
        assert_eq!(params.no_token_id, ids.no);
        assert_eq!(params.collateral_token, d.collateral_token);
    }

    #[test]
    fn test_determine_outcome() {
        let d = decoder();
        let params = d.market_params(CONDITION, B256::ZERO, Address::ZERO, None);
        assert_eq!(
            determine_outcome(params.yes_token_id, &params).unwrap(),
            Outcome::Yes
        );
        assert_eq!(
            determine_outcome(params.no_token_id, &params).unwrap(),
            Outcome::No
        );
        assert!(matches!(
            determine_outcome(U256::from(42), &params),
            Err(IndexerError::UnknownToken(_))
        ));
    }
}
