//! Configuration for the trades indexer daemon.
//!
//! Configuration comes from two sources:
//! - Environment variables (via .env file or shell): connection details,
//!   chain deployment overrides
//! - CLI arguments: scan parameters and market seeds

use std::time::Duration;

use alloy::primitives::{Address, B256, TxHash};
use clap::Parser;
use ctf_indexer::{
    Chain,
    indexer::{IndexerConfig, RetryPolicy},
    types::TRADE_SYNC_KEY,
};

/// Environment configuration (connection details, deployment).
///
/// The chain deployment defaults to the Polygon reference deployment; to
/// target another one, all of `CHAIN_ID`, `COLLATERAL_TOKEN_ADDRESS` and
/// `EXCHANGE_ADDRESSES` must be set together.
#[derive(Debug, serde::Deserialize)]
pub struct EnvConfig {
    /// RPC URL for the node
    pub node_rpc_url: String,

    /// Chain ID override
    pub chain_id: Option<u64>,

    /// Collateral token address override
    pub collateral_token_address: Option<String>,

    /// Collateral decimals override (default: 6)
    pub collateral_decimals: Option<u8>,

    /// Exchange contract addresses override (comma-separated)
    pub exchange_addresses: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    /// Resolve the chain deployment to index.
    pub fn chain(&self) -> Result<Chain, ConfigError> {
        match (
            self.chain_id,
            &self.collateral_token_address,
            &self.exchange_addresses,
        ) {
            (None, None, None) => Ok(Chain::polygon()),
            (Some(chain_id), Some(collateral), Some(exchanges)) => {
                let collateral: Address = collateral
                    .parse()
                    .map_err(|_| ConfigError::InvalidAddress(collateral.clone()))?;
                let exchanges = exchanges
                    .split(',')
                    .map(|s| {
                        s.trim()
                            .parse()
                            .map_err(|_| ConfigError::InvalidAddress(s.trim().to_string()))
                    })
                    .collect::<Result<Vec<Address>, _>>()?;
                Ok(Chain::custom(
                    chain_id,
                    collateral,
                    self.collateral_decimals.unwrap_or(6),
                    exchanges,
                ))
            }
            _ => Err(ConfigError::PartialChainOverride),
        }
    }
}

/// CLI arguments for the scan.
#[derive(Debug, Parser)]
#[command(name = "indexerd")]
#[command(about = "Trades indexer for conditional-token exchange fills")]
pub struct CliConfig {
    /// Blocks per scan window
    #[arg(long, default_value_t = 1000)]
    pub batch_size: u64,

    /// Blocks behind the head to seed the cursor on first run
    #[arg(long, default_value_t = 1000)]
    pub seed_lag: u64,

    /// Seconds to wait between polls while caught up with the head
    #[arg(long, default_value_t = 30)]
    pub idle_poll_secs: u64,

    /// Seconds to back off before retrying a failed block window
    #[arg(long, default_value_t = 5)]
    pub retry_secs: u64,

    /// Seconds between ingestion stats log lines
    #[arg(long, default_value_t = 300)]
    pub stats_interval_secs: u64,

    /// Sync cursor name
    #[arg(long, default_value = TRADE_SYNC_KEY)]
    pub sync_key: String,

    /// Condition ids of the markets to index (comma-separated hex)
    #[arg(long = "market", value_delimiter = ',')]
    pub markets: Vec<String>,

    /// Decode the fills of a single transaction and exit
    #[arg(long)]
    pub decode_tx: Option<String>,
}

impl CliConfig {
    /// Convert CLI config to the indexer's scan configuration.
    pub fn to_indexer_config(&self) -> Result<IndexerConfig, ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        Ok(IndexerConfig {
            batch_size: self.batch_size,
            seed_lag: self.seed_lag,
            idle_poll: Duration::from_secs(self.idle_poll_secs),
            retry: RetryPolicy::unbounded(Duration::from_secs(self.retry_secs)),
            sync_key: self.sync_key.clone(),
        })
    }

    /// Parse the seeded market condition ids.
    pub fn condition_ids(&self) -> Result<Vec<B256>, ConfigError> {
        self.markets
            .iter()
            .map(|s| {
                s.parse()
                    .map_err(|_| ConfigError::InvalidConditionId(s.clone()))
            })
            .collect()
    }

    /// Parse the one-shot decode target, if any.
    pub fn decode_tx(&self) -> Result<Option<TxHash>, ConfigError> {
        self.decode_tx
            .as_ref()
            .map(|s| s.parse().map_err(|_| ConfigError::InvalidTxHash(s.clone())))
            .transpose()
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("batch_size cannot be zero")]
    ZeroBatchSize,

    #[error("Invalid condition id: {0}")]
    InvalidConditionId(String),

    #[error("Invalid transaction hash: {0}")]
    InvalidTxHash(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("CHAIN_ID, COLLATERAL_TOKEN_ADDRESS and EXCHANGE_ADDRESSES must be set together")]
    PartialChainOverride,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(batch_size: u64, markets: Vec<String>) -> CliConfig {
        CliConfig {
            batch_size,
            seed_lag: 1000,
            idle_poll_secs: 30,
            retry_secs: 5,
            stats_interval_secs: 300,
            sync_key: TRADE_SYNC_KEY.to_string(),
            markets,
            decode_tx: None,
        }
    }

    #[test]
    fn test_cli_config_to_indexer_config() {
        let config = cli(500, vec![]).to_indexer_config().unwrap();
        assert_eq!(config.batch_size, 500);
        assert_eq!(config.idle_poll, Duration::from_secs(30));
        assert_eq!(config.sync_key, TRADE_SYNC_KEY);
    }

    #[test]
    fn test_zero_batch_size() {
        assert!(matches!(
            cli(0, vec![]).to_indexer_config(),
            Err(ConfigError::ZeroBatchSize)
        ));
    }

    #[test]
    fn test_condition_ids() {
        let good = cli(
            1000,
            vec![
                "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa01"
                    .to_string(),
            ],
        );
        assert_eq!(good.condition_ids().unwrap().len(), 1);

        let bad = cli(1000, vec!["not-a-hash".to_string()]);
        assert!(matches!(
            bad.condition_ids(),
            Err(ConfigError::InvalidConditionId(_))
        ));
    }
}
