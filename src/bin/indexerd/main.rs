//! Trades indexer daemon.
//!
//! Continuously scans the configured exchange contracts for `OrderFilled`
//! events, resolves them against seeded markets, and maintains a
//! checkpointed trade ledger until interrupted.

mod config;

use std::{process::exit, sync::Arc};

use alloy::{
    primitives::{Address, B256},
    providers::{DynProvider, ProviderBuilder},
    rpc::client::RpcClient,
};
use clap::Parser;
use ctf_indexer::{
    client::RpcChain,
    fill::FillDecoder,
    indexer::TradeIndexer,
    market::MarketDecoder,
    store::TradeStore,
    testing::MemoryStore,
};
use tracing::{error, info, warn};
use url::Url;

use config::{CliConfig, EnvConfig};

#[tokio::main]
async fn main() {
    // Load .env file
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Warning: Failed to load .env file: {}", e);
    }

    // Parse environment configuration
    let env_config = match EnvConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to parse environment configuration: {}", e);
            exit(1);
        }
    };

    // Parse CLI arguments
    let cli_config = CliConfig::parse();

    let indexer_config = match cli_config.to_indexer_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            exit(1);
        }
    };

    let condition_ids = match cli_config.condition_ids() {
        Ok(ids) => ids,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            exit(1);
        }
    };

    let decode_tx = match cli_config.decode_tx() {
        Ok(tx) => tx,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            exit(1);
        }
    };

    // Set up logging
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let chain = match env_config.chain() {
        Ok(chain) => chain,
        Err(e) => {
            eprintln!("Invalid chain configuration: {}", e);
            exit(1);
        }
    };

    // Parse RPC URL
    let node_url = match Url::parse(&env_config.node_rpc_url) {
        Ok(url) => url,
        Err(e) => {
            eprintln!("Invalid RPC URL: {}", e);
            exit(1);
        }
    };

    let rpc_client = RpcClient::new_http(node_url);
    let provider = DynProvider::new(ProviderBuilder::new().connect_client(rpc_client));
    let decoder = FillDecoder::new(chain.clone(), RpcChain::new(provider));

    // One-shot mode: decode a single transaction and exit.
    if let Some(tx_hash) = decode_tx {
        match decoder.decode_tx(tx_hash).await {
            Ok(fills) => {
                info!(%tx_hash, count = fills.len(), "decoded transaction");
                for fill in fills {
                    info!(
                        log_index = fill.log_index,
                        side = %fill.side,
                        price = %fill.price,
                        size = %fill.size,
                        token_id = %fill.token_id,
                        "fill"
                    );
                }
            }
            Err(e) => {
                error!(%tx_hash, %e, "failed to decode transaction");
                exit(1);
            }
        }
        return;
    }

    let store = MemoryStore::new();
    let market_decoder = MarketDecoder::new(chain.collateral_token());
    if condition_ids.is_empty() {
        warn!("no markets seeded; all fills will be skipped as unknown");
    }
    for condition_id in condition_ids {
        // Question id and oracle are unknown for CLI-seeded markets; only
        // the derived token ids matter for fill resolution.
        let params = market_decoder.market_params(condition_id, B256::ZERO, Address::ZERO, None);
        match store.insert_market(params).await {
            Ok(record) => info!(market_id = record.id, %condition_id, "seeded market"),
            Err(e) => {
                error!(%condition_id, %e, "failed to seed market");
                exit(1);
            }
        }
    }

    let stats_interval = cli_config.stats_interval();
    let indexer = Arc::new(TradeIndexer::new(decoder, store, indexer_config));

    let runner = indexer.clone();
    let handle = tokio::spawn(async move { runner.run(tokio::time::sleep).await });

    let stats_indexer = indexer.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(stats_interval);
        interval.tick().await; // first tick completes immediately
        loop {
            interval.tick().await;
            match stats_indexer.stats().await {
                Ok(stats) => info!(
                    total_trades = stats.total_trades,
                    trades_today = stats.trades_today,
                    last_sync = stats.last_sync,
                    "ingestion stats"
                ),
                Err(e) => warn!(%e, "failed to read ingestion stats"),
            }
        }
    });

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(%e, "failed to listen for shutdown signal");
    }
    indexer.stop();

    match handle.await {
        Ok(Ok(())) => info!("indexer shut down"),
        Ok(Err(e)) => {
            error!(%e, "indexer encountered an error, shutting down");
            exit(1);
        }
        Err(e) => {
            error!(%e, "indexer task panicked");
            exit(1);
        }
    }
}
