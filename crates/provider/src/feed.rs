use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tracing::debug;
use types::FeedUpdate;

use crate::error::ProviderError;
use crate::provider::HistoryApi;

/// Live feed of confirmed transactions, resumable from a slot.
///
/// Implementations own their reconnection; errors delivered through the
/// channel are informational and never end the subscription. Dropping the
/// receiver cancels it.
#[async_trait]
pub trait PushFeed: Send + Sync {
    async fn subscribe(
        &self,
        start_slot: i64,
    ) -> Result<mpsc::Receiver<Result<FeedUpdate, ProviderError>>, ProviderError>;
}

/// Synthesizes the push interface by polling the History API for a fixed set
/// of mints. Stands in for an external streaming client behind the same
/// trait; delivery is at-least-once (a transaction touching two tracked
/// mints may be delivered twice, which the sink dedups).
pub struct PollingFeed {
    history: Arc<dyn HistoryApi>,
    mints: Vec<String>,
    poll_interval: Duration,
    page_limit: usize,
}

impl PollingFeed {
    pub fn new(
        history: Arc<dyn HistoryApi>,
        mints: Vec<String>,
        poll_interval: Duration,
        page_limit: usize,
    ) -> Self {
        Self {
            history,
            mints,
            poll_interval,
            page_limit,
        }
    }
}

#[async_trait]
impl PushFeed for PollingFeed {
    async fn subscribe(
        &self,
        start_slot: i64,
    ) -> Result<mpsc::Receiver<Result<FeedUpdate, ProviderError>>, ProviderError> {
        let (sender, receiver) = mpsc::channel(1024);
        let history = Arc::clone(&self.history);
        let mints = self.mints.clone();
        let poll_interval = self.poll_interval;
        let page_limit = self.page_limit;

        tokio::spawn(async move {
            let mut highest = start_slot;
            loop {
                let mut max_seen = highest;
                for mint in &mints {
                    match history.fetch_page(mint, None, page_limit).await {
                        Ok(page) => {
                            // Pages are newest-first; deliver oldest-first so
                            // slots arrive in feed order.
                            for txn in page.iter().rev() {
                                if txn.slot <= highest {
                                    continue;
                                }
                                let block_time = Utc
                                    .timestamp_opt(txn.timestamp, 0)
                                    .single()
                                    .unwrap_or_else(Utc::now);
                                let update = FeedUpdate {
                                    slot: txn.slot,
                                    signature: txn.signature.clone(),
                                    block_time,
                                    transfers: txn.transfers.clone(),
                                };
                                if sender.send(Ok(update)).await.is_err() {
                                    debug!("feed subscriber dropped, stopping poll loop");
                                    return;
                                }
                                max_seen = max_seen.max(txn.slot);
                            }
                        }
                        Err(err) => {
                            if sender.send(Err(err)).await.is_err() {
                                return;
                            }
                        }
                    }
                }
                highest = max_seen;
                sleep(poll_interval).await;
            }
        });

        Ok(receiver)
    }
}
