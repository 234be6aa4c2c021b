//! End-to-end indexing tests over the in-memory chain and store.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use alloy::primitives::{Address, B256, TxHash, U256, address, b256};
use ctf_indexer::{
    Chain,
    abi::exchange::OrderFilled,
    fill::FillDecoder,
    indexer::{IndexerConfig, RetryPolicy, RunState, TradeIndexer},
    market::MarketDecoder,
    testing::{FakeChain, MemoryStore},
    types::{MarketRecord, Outcome, Side},
};
use fastnum::udec64;

const EXCHANGE: Address = address!("0x4bFb41d5B3570DeFd03C39a9A4D8dE6Bd8B8982E");
const MAKER: Address = address!("0x1000000000000000000000000000000000000001");
const TAKER: Address = address!("0x2000000000000000000000000000000000000002");
const CONDITION: B256 =
    b256!("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa01");

fn tx(n: u8) -> TxHash {
    B256::repeat_byte(n)
}

/// Maker pays `collateral` for `tokens` of `token_id`.
fn buy(token_id: U256, collateral: u64, tokens: u64) -> OrderFilled {
    OrderFilled {
        orderHash: B256::repeat_byte(0x42),
        maker: MAKER,
        taker: TAKER,
        makerAssetId: U256::ZERO,
        takerAssetId: token_id,
        makerAmountFilled: U256::from(collateral),
        takerAmountFilled: U256::from(tokens),
        fee: U256::ZERO,
    }
}

/// Maker sells `tokens` of `token_id` for `collateral`.
fn sell(token_id: U256, tokens: u64, collateral: u64) -> OrderFilled {
    OrderFilled {
        orderHash: B256::repeat_byte(0x42),
        maker: MAKER,
        taker: TAKER,
        makerAssetId: token_id,
        takerAssetId: U256::ZERO,
        makerAmountFilled: U256::from(tokens),
        takerAmountFilled: U256::from(collateral),
        fee: U256::ZERO,
    }
}

fn seed_market(store: &MemoryStore) -> MarketRecord {
    let decoder = MarketDecoder::new(Chain::polygon().collateral_token());
    store.add_market(decoder.market_params(CONDITION, B256::ZERO, Address::ZERO, None))
}

fn indexer(
    chain: &FakeChain,
    store: &MemoryStore,
    config: IndexerConfig,
) -> TradeIndexer<FakeChain, MemoryStore> {
    TradeIndexer::new(
        FillDecoder::new(Chain::polygon(), chain.clone()),
        store.clone(),
        config,
    )
}

#[tokio::test]
async fn test_index_blocks_end_to_end() {
    let chain = FakeChain::new();
    let store = MemoryStore::new();
    let market = seed_market(&store);

    chain.push_fill(
        105,
        tx(1),
        0,
        EXCHANGE,
        &buy(market.params.yes_token_id, 62_000000, 100_000000),
    );
    chain.push_fill(
        110,
        tx(2),
        1,
        EXCHANGE,
        &sell(market.params.no_token_id, 400_000000, 100_000000),
    );
    chain.set_timestamp(105, 1_700_000_500);
    chain.set_head(200);

    let indexer = indexer(&chain, &store, IndexerConfig::default());
    let inserted = indexer.index_blocks(100, 200).await.unwrap();
    assert_eq!(inserted, 2);

    let trades = store.trades();
    assert_eq!(trades.len(), 2);

    let yes_buy = &trades[0];
    assert_eq!(yes_buy.market_id, market.id);
    assert_eq!(yes_buy.outcome, Outcome::Yes);
    assert_eq!(yes_buy.block_timestamp, 1_700_000_500);
    assert_eq!(yes_buy.fill.side, Side::Buy);
    assert_eq!(yes_buy.fill.price, udec64!(0.62));
    assert_eq!(yes_buy.fill.size, U256::from(100_000000u64));

    let no_sell = &trades[1];
    assert_eq!(no_sell.outcome, Outcome::No);
    assert_eq!(no_sell.fill.side, Side::Sell);
    assert_eq!(no_sell.fill.price, udec64!(0.25));

    let sync = indexer.sync_state().await.unwrap().unwrap();
    assert_eq!(sync.last_block, 200);
}

#[tokio::test]
async fn test_reingestion_is_idempotent() {
    let chain = FakeChain::new();
    let store = MemoryStore::new();
    let market = seed_market(&store);

    chain.push_fill(
        105,
        tx(1),
        0,
        EXCHANGE,
        &buy(market.params.yes_token_id, 50_000000, 100_000000),
    );
    chain.set_head(200);

    let indexer = indexer(&chain, &store, IndexerConfig::default());
    assert_eq!(indexer.index_blocks(100, 200).await.unwrap(), 1);
    assert_eq!(indexer.index_blocks(100, 200).await.unwrap(), 0);
    assert_eq!(store.trades().len(), 1);

    // Consecutive windows move the cursor monotonically.
    assert_eq!(indexer.sync_state().await.unwrap().unwrap().last_block, 200);
    indexer.index_blocks(201, 300).await.unwrap();
    assert_eq!(indexer.sync_state().await.unwrap().unwrap().last_block, 300);
}

#[tokio::test]
async fn test_unknown_market_fill_is_skipped() {
    let chain = FakeChain::new();
    let store = MemoryStore::new();
    let market = seed_market(&store);

    // A fill for a token no stored market owns, mixed with a known one.
    chain.push_fill(105, tx(1), 0, EXCHANGE, &buy(U256::from(0xAA), 1_000000, 2_000000));
    chain.push_fill(
        106,
        tx(2),
        0,
        EXCHANGE,
        &buy(market.params.yes_token_id, 1_000000, 2_000000),
    );
    chain.set_head(200);

    let indexer = indexer(&chain, &store, IndexerConfig::default());
    assert_eq!(indexer.index_blocks(100, 200).await.unwrap(), 1);
    let trades = store.trades();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].fill.tx_hash, tx(2));

    // The cursor still advances: the range was fully scanned.
    assert_eq!(indexer.sync_state().await.unwrap().unwrap().last_block, 200);
}

#[tokio::test]
async fn test_internal_transfer_not_indexed() {
    let chain = FakeChain::new();
    let store = MemoryStore::new();
    let market = seed_market(&store);

    let mut event = buy(market.params.yes_token_id, 1_000000, 2_000000);
    event.taker = EXCHANGE;
    chain.push_fill(105, tx(1), 0, EXCHANGE, &event);
    chain.set_head(200);

    let indexer = indexer(&chain, &store, IndexerConfig::default());
    assert_eq!(indexer.index_blocks(100, 200).await.unwrap(), 0);
    assert!(store.trades().is_empty());
}

#[tokio::test]
async fn test_non_exchange_logs_ignored() {
    let chain = FakeChain::new();
    let store = MemoryStore::new();
    let market = seed_market(&store);

    let impostor = address!("0x9999999999999999999999999999999999999999");
    chain.push_fill(
        105,
        tx(1),
        0,
        impostor,
        &buy(market.params.yes_token_id, 1_000000, 2_000000),
    );
    chain.set_head(200);

    let indexer = indexer(&chain, &store, IndexerConfig::default());
    assert_eq!(indexer.index_blocks(100, 200).await.unwrap(), 0);
    assert!(store.trades().is_empty());
}

#[tokio::test]
async fn test_trades_ordered_by_block_and_log_index() {
    let chain = FakeChain::new();
    let store = MemoryStore::new();
    let market = seed_market(&store);
    let yes = market.params.yes_token_id;

    chain.push_fill(120, tx(3), 3, EXCHANGE, &buy(yes, 30_000000, 100_000000));
    chain.push_fill(105, tx(1), 1, EXCHANGE, &buy(yes, 10_000000, 100_000000));
    chain.push_fill(105, tx(2), 0, EXCHANGE, &buy(yes, 20_000000, 100_000000));
    chain.set_head(200);

    let indexer = indexer(&chain, &store, IndexerConfig::default());
    assert_eq!(indexer.index_blocks(100, 200).await.unwrap(), 3);

    let trades = store.trades();
    let keys: Vec<(u64, u64)> = trades
        .iter()
        .map(|row| (row.fill.block_number, row.fill.log_index))
        .collect();
    assert_eq!(keys, vec![(105, 0), (105, 1), (120, 3)]);
}

#[tokio::test]
async fn test_timestamp_failure_fails_window_without_advancing_cursor() {
    let chain = FakeChain::new();
    let store = MemoryStore::new();
    let market = seed_market(&store);

    chain.push_fill(
        105,
        tx(1),
        0,
        EXCHANGE,
        &buy(market.params.yes_token_id, 50_000000, 100_000000),
    );
    chain.set_head(200);
    chain.fail_timestamp_queries(1);

    let indexer = indexer(&chain, &store, IndexerConfig::default());

    // The whole window fails before any fill is written or the cursor moves.
    assert!(indexer.index_blocks(100, 200).await.is_err());
    assert!(store.trades().is_empty());
    assert_eq!(indexer.sync_state().await.unwrap(), None);

    // Retrying the same window picks the fill up.
    assert_eq!(indexer.index_blocks(100, 200).await.unwrap(), 1);
    assert_eq!(store.trades().len(), 1);
    assert_eq!(indexer.sync_state().await.unwrap().unwrap().last_block, 200);
}

#[tokio::test]
async fn test_store_failure_skips_fill_and_rescan_recovers() {
    let chain = FakeChain::new();
    let store = MemoryStore::new();
    let market = seed_market(&store);
    let yes = market.params.yes_token_id;

    chain.push_fill(105, tx(1), 0, EXCHANGE, &buy(yes, 10_000000, 100_000000));
    chain.push_fill(110, tx(2), 0, EXCHANGE, &buy(yes, 20_000000, 100_000000));
    chain.set_head(200);
    store.fail_trade_inserts(1);

    let indexer = indexer(&chain, &store, IndexerConfig::default());

    // The failed insert is skipped, the rest of the batch lands and the
    // cursor advances.
    assert_eq!(indexer.index_blocks(100, 200).await.unwrap(), 1);
    assert_eq!(store.trades().len(), 1);
    assert_eq!(indexer.sync_state().await.unwrap().unwrap().last_block, 200);

    // Re-scanning the range recovers the skipped fill.
    assert_eq!(indexer.index_blocks(100, 200).await.unwrap(), 1);
    assert_eq!(store.trades().len(), 2);
}

#[tokio::test]
async fn test_zero_batch_size_scans_single_blocks() {
    let chain = FakeChain::new();
    let store = MemoryStore::new();
    let market = seed_market(&store);

    chain.push_fill(
        3,
        tx(1),
        0,
        EXCHANGE,
        &buy(market.params.yes_token_id, 50_000000, 100_000000),
    );
    chain.set_head(5);

    let indexer = Arc::new(indexer(
        &chain,
        &store,
        IndexerConfig {
            batch_size: 0,
            ..Default::default()
        },
    ));

    let stopper = indexer.clone();
    indexer
        .run(move |_| {
            let stopper = stopper.clone();
            async move { stopper.stop() }
        })
        .await
        .unwrap();

    assert_eq!(store.trades().len(), 1);
    assert_eq!(indexer.sync_state().await.unwrap().unwrap().last_block, 5);
}

#[tokio::test]
async fn test_run_seeds_cursor_and_indexes_to_head() {
    let chain = FakeChain::new();
    let store = MemoryStore::new();
    let market = seed_market(&store);

    chain.push_fill(
        1060,
        tx(1),
        0,
        EXCHANGE,
        &buy(market.params.yes_token_id, 50_000000, 100_000000),
    );
    chain.push_fill(
        2049,
        tx(2),
        0,
        EXCHANGE,
        &sell(market.params.no_token_id, 100_000000, 25_000000),
    );
    chain.set_head(2050);

    let indexer = Arc::new(indexer(
        &chain,
        &store,
        IndexerConfig {
            batch_size: 500,
            ..Default::default()
        },
    ));

    // The loop only sleeps when caught up (or retrying); stopping there ends
    // the run deterministically.
    let stopper = indexer.clone();
    indexer
        .run(move |_| {
            let stopper = stopper.clone();
            async move { stopper.stop() }
        })
        .await
        .unwrap();

    assert_eq!(indexer.run_state(), RunState::Idle);
    assert_eq!(store.trades().len(), 2);
    // Cursor seeded at head - seed_lag (1050), then advanced window by
    // window to the head.
    assert_eq!(indexer.sync_state().await.unwrap().unwrap().last_block, 2050);
}

#[tokio::test]
async fn test_run_retries_failed_window_without_losing_fills() {
    let chain = FakeChain::new();
    let store = MemoryStore::new();
    let market = seed_market(&store);

    chain.push_fill(
        1500,
        tx(1),
        0,
        EXCHANGE,
        &buy(market.params.yes_token_id, 50_000000, 100_000000),
    );
    chain.set_head(2000);
    chain.fail_log_queries(1);

    let indexer = Arc::new(indexer(&chain, &store, IndexerConfig::default()));

    // First sleep is the retry backoff, second means caught up; stop there.
    let sleeps = Arc::new(AtomicU64::new(0));
    let stopper = indexer.clone();
    indexer
        .run(move |_| {
            let stop = sleeps.fetch_add(1, Ordering::SeqCst) >= 1;
            let stopper = stopper.clone();
            async move {
                if stop {
                    stopper.stop();
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(store.trades().len(), 1);
    assert_eq!(indexer.sync_state().await.unwrap().unwrap().last_block, 2000);
}

#[tokio::test]
async fn test_bounded_retry_gives_up() {
    let chain = FakeChain::new();
    let store = MemoryStore::new();
    seed_market(&store);
    chain.set_head(2000);
    chain.fail_log_queries(10);

    let indexer = indexer(
        &chain,
        &store,
        IndexerConfig {
            retry: RetryPolicy::bounded(2, Duration::from_millis(1)),
            ..Default::default()
        },
    );

    let result = indexer.run(tokio::time::sleep).await;
    assert!(result.is_err());
    assert_eq!(indexer.run_state(), RunState::Idle);
    assert!(store.trades().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_while_running_is_noop() {
    let chain = FakeChain::new();
    let store = MemoryStore::new();
    chain.set_head(100);

    let indexer = Arc::new(indexer(
        &chain,
        &store,
        IndexerConfig {
            idle_poll: Duration::from_millis(5),
            ..Default::default()
        },
    ));

    let runner = indexer.clone();
    let handle = tokio::spawn(async move { runner.run(tokio::time::sleep).await });

    // Wait for the loop to take the running state.
    while indexer.run_state() != RunState::Running {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    // A second start returns immediately without touching the first run.
    indexer.run(tokio::time::sleep).await.unwrap();
    assert_eq!(indexer.run_state(), RunState::Running);

    indexer.stop();
    handle.await.unwrap().unwrap();
    assert_eq!(indexer.run_state(), RunState::Idle);
}

#[tokio::test]
async fn test_status_and_stats() {
    let chain = FakeChain::new();
    let store = MemoryStore::new();
    let market = seed_market(&store);

    chain.push_fill(
        105,
        tx(1),
        0,
        EXCHANGE,
        &buy(market.params.yes_token_id, 50_000000, 100_000000),
    );
    chain.set_head(300);

    let indexer = indexer(&chain, &store, IndexerConfig::default());
    indexer.index_blocks(100, 200).await.unwrap();

    let status = indexer.status().await.unwrap();
    assert_eq!(status.last_block, 200);
    assert_eq!(status.current_block, 300);

    let stats = indexer.stats().await.unwrap();
    assert_eq!(stats.total_trades, 1);
    assert_eq!(stats.trades_today, 1);
    assert!(stats.last_sync.is_some());
}
