use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use config::Config;
use futures::future::join_all;
use provider::HistoryApi;
use storage::{Storage, MAX_INSERT_ROWS};
use tokio::spawn;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};
use types::{HistoryTransaction, TransferRecord};

use crate::error::EtlError;
use crate::universe::TokenUniverse;

/// Why a page ended the pagination loop, if it did. The two terminal states
/// are kept apart: exhaustion means the history ran out, the age boundary
/// means the rest of the history is older than the lookback window.
enum PageOutcome {
    Continue,
    Exhausted,
    TooOld,
}

/// Historical catch-up for a set of mints, newest to oldest, bounded by the
/// lookback window.
pub struct BackfillEngine {
    config: Config,
    storage: Arc<dyn Storage>,
    history: Arc<dyn HistoryApi>,
    universe: Arc<TokenUniverse>,
}

// Clone copies the Arc handles, not the underlying storage or client
impl Clone for BackfillEngine {
    fn clone(&self) -> Self {
        BackfillEngine {
            config: self.config.clone(),
            storage: Arc::clone(&self.storage),
            history: Arc::clone(&self.history),
            universe: Arc::clone(&self.universe),
        }
    }
}

impl BackfillEngine {
    pub fn new(
        config: Config,
        storage: Arc<dyn Storage>,
        history: Arc<dyn HistoryApi>,
        universe: Arc<TokenUniverse>,
    ) -> Self {
        Self {
            config,
            storage,
            history,
            universe,
        }
    }

    /// Backfill every mint in `mints` with a bounded worker pool. A mint
    /// whose backfill fails is logged and skipped; the pool completes when
    /// all workers finish, not when all mints succeed.
    pub async fn run(&self, mints: Vec<String>) {
        info!(
            mints = mints.len(),
            workers = self.config.backfill_concurrency,
            "starting backfill"
        );
        let mints = Arc::new(mints);
        let next = Arc::new(AtomicUsize::new(0));

        let mut workers = Vec::new();
        for _ in 0..self.config.backfill_concurrency {
            let engine = self.clone();
            let mints = Arc::clone(&mints);
            let next = Arc::clone(&next);
            workers.push(spawn(async move {
                loop {
                    let i = next.fetch_add(1, Ordering::SeqCst);
                    let Some(mint) = mints.get(i) else {
                        break;
                    };
                    info!(mint = %mint, "backfilling mint");
                    if let Err(err) = engine.backfill_mint(mint).await {
                        error!(mint = %mint, error = %err, "backfill aborted for mint");
                    }
                }
            }));
        }

        join_all(workers).await;
        info!("backfill complete");
    }

    /// Walk one mint's history backward from "now" until an empty page or
    /// the first transaction older than the lookback window.
    pub async fn backfill_mint(&self, mint: &str) -> Result<(), EtlError> {
        // one snapshot for the whole pass, so filtering stays consistent
        // even if the refresher swaps the set mid-run
        let universe = self.universe.snapshot().await;
        let cutoff = Utc::now().timestamp() - self.config.lookback_days * 86_400;

        let mut before: Option<String> = None;
        let mut batch: Vec<TransferRecord> = Vec::new();

        loop {
            let page = self.fetch_page_with_retry(mint, before.as_deref()).await?;
            let outcome = self
                .consume_page(mint, &page, cutoff, &universe, &mut batch)
                .await?;
            // remainder of this page, or the partial page ahead of the
            // age boundary
            self.flush_batch(mint, &mut batch).await?;

            match outcome {
                PageOutcome::Exhausted => {
                    debug!(mint = %mint, "history exhausted");
                    return Ok(());
                }
                PageOutcome::TooOld => {
                    debug!(mint = %mint, "reached lookback boundary");
                    return Ok(());
                }
                PageOutcome::Continue => {
                    before = page.last().map(|txn| txn.signature.clone());
                    sleep(Duration::from_millis(self.config.page_delay_ms)).await;
                }
            }
        }
    }

    async fn consume_page(
        &self,
        mint: &str,
        page: &[HistoryTransaction],
        cutoff: i64,
        universe: &HashSet<String>,
        batch: &mut Vec<TransferRecord>,
    ) -> Result<PageOutcome, EtlError> {
        if page.is_empty() {
            return Ok(PageOutcome::Exhausted);
        }

        for txn in page {
            // pages are newest-first: the first too-old transaction means
            // everything after it is too old as well
            if txn.timestamp < cutoff {
                return Ok(PageOutcome::TooOld);
            }
            let block_time = Utc
                .timestamp_opt(txn.timestamp, 0)
                .single()
                .unwrap_or_else(Utc::now);

            for (i, transfer) in txn.transfers.iter().enumerate() {
                if !universe.contains(&transfer.mint) {
                    continue;
                }
                batch.push(TransferRecord {
                    slot: txn.slot,
                    signature: txn.signature.clone(),
                    transfer_index: i as i32,
                    mint: transfer.mint.clone(),
                    from_account: transfer.from_account.clone(),
                    to_account: transfer.to_account.clone(),
                    amount: transfer.amount.clone(),
                    decimals: transfer.decimals,
                    block_time,
                });
            }

            if batch.len() >= self.config.db_batch_size {
                self.flush_batch(mint, batch).await?;
            }
        }

        Ok(PageOutcome::Continue)
    }

    async fn flush_batch(
        &self,
        mint: &str,
        batch: &mut Vec<TransferRecord>,
    ) -> Result<(), EtlError> {
        if batch.is_empty() {
            return Ok(());
        }
        for chunk in batch.chunks(MAX_INSERT_ROWS) {
            self.storage.write_transfers(chunk).await?;
        }
        debug!(mint = %mint, rows = batch.len(), "committed backfill batch");
        batch.clear();
        Ok(())
    }

    async fn fetch_page_with_retry(
        &self,
        mint: &str,
        before: Option<&str>,
    ) -> Result<Vec<HistoryTransaction>, EtlError> {
        let mut delay = Duration::from_millis(self.config.retry_base_ms);
        let mut attempt = 0u32;
        loop {
            match self
                .history
                .fetch_page(mint, before, self.config.page_limit)
                .await
            {
                Ok(page) => return Ok(page),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.config.fetch_retries {
                        return Err(EtlError::RetriesExhausted {
                            attempts: attempt,
                            source: err,
                        });
                    }
                    warn!(mint = %mint, attempt, error = %err, "page fetch failed, backing off");
                    sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{history_txn, raw_transfer, ScriptedHistory};
    use mock_storage::MockStorage;

    const MINT_A: &str = "MintA";
    const MINT_B: &str = "MintB";

    fn test_config() -> Config {
        Config {
            db_batch_size: 500,
            page_delay_ms: 0,
            fetch_retries: 3,
            retry_base_ms: 1,
            ..Config::default()
        }
    }

    fn engine(
        config: Config,
        mints: &[&str],
    ) -> (BackfillEngine, Arc<MockStorage>, Arc<ScriptedHistory>) {
        let storage = Arc::new(MockStorage::new(0));
        let history = Arc::new(ScriptedHistory::new());
        let universe = Arc::new(TokenUniverse::new(
            mints.iter().map(|m| m.to_string()).collect(),
        ));
        let engine = BackfillEngine::new(
            config,
            Arc::clone(&storage) as Arc<dyn Storage>,
            Arc::clone(&history) as Arc<dyn HistoryApi>,
            universe,
        );
        (engine, storage, history)
    }

    fn now() -> i64 {
        Utc::now().timestamp()
    }

    #[tokio::test]
    async fn consumes_all_pages_and_stops_on_the_empty_one() {
        let (engine, storage, history) = engine(test_config(), &[MINT_A]);
        let recent = now() - 3600;
        history.script_page(
            MINT_A,
            vec![history_txn("sig1", 100, recent, vec![raw_transfer(MINT_A, "1")])],
        );
        history.script_page(
            MINT_A,
            vec![history_txn("sig2", 90, recent - 60, vec![raw_transfer(MINT_A, "2")])],
        );
        // third fetch returns the unscripted empty page

        engine.backfill_mint(MINT_A).await.unwrap();

        assert_eq!(history.fetch_calls(), 3);
        let stored = storage.transfers();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].signature, "sig1");
        assert_eq!(stored[1].signature, "sig2");
    }

    #[tokio::test]
    async fn age_boundary_flushes_newer_transfers_from_the_same_page() {
        let (engine, storage, history) = engine(test_config(), &[MINT_A]);
        let recent = now() - 3600;
        let too_old = now() - 31 * 86_400;
        history.script_page(
            MINT_A,
            vec![
                history_txn("sig-new", 100, recent, vec![raw_transfer(MINT_A, "1")]),
                history_txn("sig-old", 10, too_old, vec![raw_transfer(MINT_A, "2")]),
            ],
        );

        engine.backfill_mint(MINT_A).await.unwrap();

        // terminated inside page 1, no further fetch
        assert_eq!(history.fetch_calls(), 1);
        let stored = storage.transfers();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].signature, "sig-new");
    }

    #[tokio::test]
    async fn three_pages_with_an_old_tail_use_exactly_three_fetches() {
        let (engine, storage, history) = engine(test_config(), &[MINT_A]);
        let recent = now() - 3600;
        let too_old = now() - 31 * 86_400;
        history.script_page(
            MINT_A,
            vec![
                history_txn("p1-a", 200, recent, vec![raw_transfer(MINT_A, "1")]),
                history_txn("p1-b", 190, recent - 10, vec![raw_transfer(MINT_A, "2")]),
            ],
        );
        history.script_page(
            MINT_A,
            vec![
                history_txn("p2-a", 180, recent - 20, vec![raw_transfer(MINT_A, "3")]),
                history_txn("p2-b", 170, recent - 30, vec![raw_transfer(MINT_A, "4")]),
            ],
        );
        history.script_page(
            MINT_A,
            vec![
                history_txn("p3-a", 160, too_old, vec![raw_transfer(MINT_A, "5")]),
                history_txn("p3-b", 150, too_old - 10, vec![raw_transfer(MINT_A, "6")]),
            ],
        );

        engine.backfill_mint(MINT_A).await.unwrap();

        assert_eq!(history.fetch_calls(), 3);
        let signatures: Vec<_> = storage
            .transfers()
            .iter()
            .map(|t| t.signature.clone())
            .collect();
        assert_eq!(signatures, vec!["p1-a", "p1-b", "p2-a", "p2-b"]);
    }

    #[tokio::test]
    async fn untracked_mints_never_reach_the_sink() {
        let (engine, storage, history) = engine(test_config(), &[MINT_A]);
        let recent = now() - 3600;
        history.script_page(
            MINT_A,
            vec![history_txn(
                "sig1",
                100,
                recent,
                vec![raw_transfer(MINT_B, "1"), raw_transfer(MINT_A, "2")],
            )],
        );

        engine.backfill_mint(MINT_A).await.unwrap();

        let stored = storage.transfers();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].mint, MINT_A);
        // index reflects position in the raw transfer list, not the
        // filtered one
        assert_eq!(stored[0].transfer_index, 1);
    }

    #[tokio::test]
    async fn batch_threshold_flushes_mid_page() {
        let config = Config {
            db_batch_size: 2,
            ..test_config()
        };
        let (engine, storage, history) = engine(config, &[MINT_A]);
        let recent = now() - 3600;
        history.script_page(
            MINT_A,
            vec![
                history_txn("sig1", 100, recent, vec![raw_transfer(MINT_A, "1")]),
                history_txn("sig2", 99, recent, vec![raw_transfer(MINT_A, "2")]),
                history_txn("sig3", 98, recent, vec![raw_transfer(MINT_A, "3")]),
            ],
        );

        engine.backfill_mint(MINT_A).await.unwrap();

        // one flush at the threshold, one for the page remainder
        assert_eq!(storage.write_calls(), 2);
        assert_eq!(storage.transfers().len(), 3);
    }

    #[tokio::test]
    async fn one_failing_mint_does_not_stop_the_pool() {
        let (engine, storage, history) = engine(test_config(), &[MINT_A, MINT_B]);
        let recent = now() - 3600;
        // MintA fails past the retry ceiling
        for _ in 0..3 {
            history.script_error(MINT_A);
        }
        history.script_page(
            MINT_B,
            vec![history_txn("sig-b", 50, recent, vec![raw_transfer(MINT_B, "9")])],
        );

        engine
            .run(vec![MINT_A.to_string(), MINT_B.to_string()])
            .await;

        let stored = storage.transfers();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].mint, MINT_B);
    }

    #[tokio::test]
    async fn retries_transient_errors_before_succeeding() {
        let (engine, storage, history) = engine(test_config(), &[MINT_A]);
        let recent = now() - 3600;
        history.script_error(MINT_A);
        history.script_page(
            MINT_A,
            vec![history_txn("sig1", 100, recent, vec![raw_transfer(MINT_A, "1")])],
        );

        engine.backfill_mint(MINT_A).await.unwrap();

        assert_eq!(storage.transfers().len(), 1);
        // error + page + trailing empty page
        assert_eq!(history.fetch_calls(), 3);
    }
}
