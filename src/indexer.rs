//! Continuous, resumable trade indexing.
//!
//! [`TradeIndexer`] walks the chain in fixed-size block windows, decoding
//! fills via [`FillDecoder`], resolving each fill's token id to a stored
//! market, and persisting rows idempotently. Progress is checkpointed in a
//! named sync cursor after every window; a window is always fully committed
//! before the next one begins, so a crash resumes at the first unprocessed
//! block and duplicate work is absorbed by the `(tx_hash, log_index)`
//! uniqueness contract.

use std::{collections::HashMap, future::Future, sync::Mutex, time::Duration};

use futures::future::try_join_all;
use itertools::Itertools;
use tracing::{debug, error, info, warn};

use crate::{
    client::ChainClient,
    error::IndexerError,
    fill::{DecodedFill, FillDecoder},
    market,
    store::{self, TradeRow, TradeStore},
    types::{IndexerStats, IndexerStatus, SyncState, TRADE_SYNC_KEY},
};

/// Run-loop lifecycle. At most one active loop per indexer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    /// Stop requested; the loop exits after its current batch.
    Stopped,
}

/// Batch-level retry behavior.
///
/// The production default retries a failed window forever with a fixed
/// backoff (a window is never skipped); tests substitute a bounded policy.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    max_attempts: Option<u32>,
    backoff: Duration,
}

impl RetryPolicy {
    pub const fn unbounded(backoff: Duration) -> Self {
        Self {
            max_attempts: None,
            backoff,
        }
    }

    pub const fn bounded(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            backoff,
        }
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    fn exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }
}

#[derive(Clone, Debug)]
pub struct IndexerConfig {
    /// Blocks per scan window. Zero is treated as one.
    pub batch_size: u64,

    /// How far behind the head to seed the cursor on first run.
    pub seed_lag: u64,

    /// Sleep between polls while caught up with the head.
    pub idle_poll: Duration,

    pub retry: RetryPolicy,

    /// Sync cursor name; one cursor per logical scan.
    pub sync_key: String,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            seed_lag: 1000,
            idle_poll: Duration::from_secs(30),
            retry: RetryPolicy::unbounded(Duration::from_secs(5)),
            sync_key: TRADE_SYNC_KEY.to_string(),
        }
    }
}

/// Drives the decode-and-index pipeline against one chain deployment.
pub struct TradeIndexer<C, S> {
    decoder: FillDecoder<C>,
    store: S,
    config: IndexerConfig,
    state: Mutex<RunState>,
}

impl<C: ChainClient, S: TradeStore> TradeIndexer<C, S> {
    pub fn new(decoder: FillDecoder<C>, store: S, config: IndexerConfig) -> Self {
        Self {
            decoder,
            store,
            config,
            state: Mutex::new(RunState::Idle),
        }
    }

    pub fn run_state(&self) -> RunState {
        *self.state.lock().expect("run-state lock")
    }

    fn is_running(&self) -> bool {
        self.run_state() == RunState::Running
    }

    /// Signal the run loop to exit after its current batch. Cooperative:
    /// the flag is observed between batches only, never mid-batch.
    pub fn stop(&self) {
        info!("stopping indexing");
        *self.state.lock().expect("run-state lock") = RunState::Stopped;
    }

    /// Run continuous indexing from the persisted cursor.
    ///
    /// No-op with a warning if a loop is already running. Exits only via
    /// [`Self::stop`] or an exhausted (bounded) retry policy; the state
    /// returns to [`RunState::Idle`] on exit either way.
    ///
    /// `sleep` is injected so tests can run the loop without real delays.
    pub async fn run<Sl, Fut>(&self, sleep: Sl) -> Result<(), IndexerError>
    where
        Sl: Fn(Duration) -> Fut,
        Fut: Future<Output = ()>,
    {
        {
            let mut state = self.state.lock().expect("run-state lock");
            if *state == RunState::Running {
                warn!("indexing already running");
                return Ok(());
            }
            *state = RunState::Running;
        }
        info!("starting continuous indexing");

        let result = self.run_loop(&sleep).await;

        *self.state.lock().expect("run-state lock") = RunState::Idle;
        info!("continuous indexing stopped");
        result
    }

    async fn run_loop<Sl, Fut>(&self, sleep: &Sl) -> Result<(), IndexerError>
    where
        Sl: Fn(Duration) -> Fut,
        Fut: Future<Output = ()>,
    {
        // Clamp so the window arithmetic below cannot underflow.
        let batch_size = self.config.batch_size.max(1);
        let mut attempts = 0u32;
        while self.is_running() {
            let (last_block, current_block) = match self.refresh_cursor().await {
                Ok(cursor) => {
                    attempts = 0;
                    cursor
                }
                Err(e) => {
                    attempts += 1;
                    if self.config.retry.exhausted(attempts) {
                        error!(%e, attempts, "giving up on sync cursor refresh");
                        return Err(e);
                    }
                    warn!(%e, "failed to refresh sync cursor, backing off");
                    sleep(self.config.retry.backoff()).await;
                    continue;
                }
            };

            if last_block >= current_block {
                debug!(last_block, current_block, "caught up with chain head, waiting");
                sleep(self.config.idle_poll).await;
                continue;
            }

            let mut from_block = last_block + 1;
            while from_block <= current_block && self.is_running() {
                let to_block = current_block.min(from_block + batch_size - 1);
                match self.index_blocks(from_block, to_block).await {
                    Ok(inserted) => {
                        info!(from_block, to_block, inserted, "indexed block range");
                        attempts = 0;
                        from_block = to_block + 1;
                    }
                    Err(e) => {
                        attempts += 1;
                        if self.config.retry.exhausted(attempts) {
                            error!(from_block, to_block, %e, attempts, "giving up on block range");
                            return Err(e);
                        }
                        // Retry the same window; a range is never skipped.
                        warn!(from_block, to_block, %e, "failed to index block range, retrying");
                        sleep(self.config.retry.backoff()).await;
                    }
                }
            }
        }
        Ok(())
    }

    async fn refresh_cursor(&self) -> Result<(u64, u64), IndexerError> {
        let last_block = self.last_synced_block().await?;
        let current_block = self.decoder.current_block().await?;
        Ok((last_block, current_block))
    }

    /// Persisted cursor position, seeded `seed_lag` blocks behind the head
    /// on first run.
    async fn last_synced_block(&self) -> Result<u64, IndexerError> {
        if let Some(state) = self.store.sync_state(&self.config.sync_key).await? {
            return Ok(state.last_block);
        }
        let current = self.decoder.current_block().await?;
        let seed = current.saturating_sub(self.config.seed_lag);
        info!(seed, "no sync state found, seeding cursor");
        self.store
            .upsert_sync_state(&self.config.sync_key, seed)
            .await?;
        Ok(seed)
    }

    /// Index one block window `[from_block, to_block]` inclusive.
    ///
    /// Per-fill conditions (unknown market, data corruption, store write
    /// failure) are logged and skipped; scan, timestamp and cursor failures
    /// fail the whole window so the caller retries it and no fill is lost.
    /// The cursor advances exactly once, after all fills are handled.
    ///
    /// Returns the number of newly inserted (non-duplicate) trades.
    pub async fn index_blocks(&self, from_block: u64, to_block: u64) -> Result<u64, IndexerError> {
        let fills = self.decoder.scan_blocks(from_block, to_block).await?;
        debug!(from_block, to_block, fills = fills.len(), "scanned block range");

        // Batch-scoped timestamp cache, fetched concurrently for the
        // window's distinct blocks and discarded with the batch.
        let timestamps: HashMap<u64, u64> = try_join_all(
            fills
                .iter()
                .map(|fill| fill.block_number)
                .unique()
                .map(|number| async move {
                    Ok::<_, IndexerError>((number, self.decoder.block_timestamp(number).await?))
                }),
        )
        .await?
        .into_iter()
        .collect();

        let mut inserted = 0u64;
        for fill in fills {
            match self.ingest_fill(&fill, &timestamps).await {
                Ok(true) => inserted += 1,
                Ok(false) => debug!(
                    tx_hash = %fill.tx_hash,
                    log_index = fill.log_index,
                    "skipping duplicate trade"
                ),
                Err(IndexerError::UnknownToken(token_id)) => warn!(
                    %token_id,
                    tx_hash = %fill.tx_hash,
                    "no market known for token id, skipping trade"
                ),
                Err(e) => error!(
                    %e,
                    tx_hash = %fill.tx_hash,
                    log_index = fill.log_index,
                    "failed to ingest fill"
                ),
            }
        }

        self.store
            .upsert_sync_state(&self.config.sync_key, to_block)
            .await?;
        Ok(inserted)
    }

    async fn ingest_fill(
        &self,
        fill: &DecodedFill,
        timestamps: &HashMap<u64, u64>,
    ) -> Result<bool, IndexerError> {
        let block_timestamp = timestamps
            .get(&fill.block_number)
            .copied()
            .ok_or(IndexerError::BlockNotFound(fill.block_number))?;

        let market = self
            .store
            .find_market_by_token_id(fill.token_id)
            .await?
            .ok_or(IndexerError::UnknownToken(fill.token_id))?;

        let outcome = market::determine_outcome(fill.token_id, &market.params)?;

        self.store
            .insert_trade_if_absent(&TradeRow::new(
                market.id,
                block_timestamp,
                outcome,
                fill.clone(),
            ))
            .await
    }

    /// Scan progress against the chain head.
    pub async fn status(&self) -> Result<IndexerStatus, IndexerError> {
        let last_block = self
            .store
            .sync_state(&self.config.sync_key)
            .await?
            .map(|s| s.last_block)
            .unwrap_or_default();
        let current_block = self.decoder.current_block().await?;
        Ok(IndexerStatus {
            last_block,
            current_block,
        })
    }

    /// Ingestion counters. Read-only, no side effects.
    pub async fn stats(&self) -> Result<IndexerStats, IndexerError> {
        let total_trades = self.store.trade_count().await?;
        let trades_today = self
            .store
            .trade_count_since(store::unix_now().saturating_sub(86_400))
            .await?;
        let last_sync = self
            .store
            .sync_state(&self.config.sync_key)
            .await?
            .map(|s| s.updated_at);
        Ok(IndexerStats {
            total_trades,
            trades_today,
            last_sync,
        })
    }

    /// The scan cursor as persisted, if any.
    pub async fn sync_state(&self) -> Result<Option<SyncState>, IndexerError> {
        self.store.sync_state(&self.config.sync_key).await
    }
}
