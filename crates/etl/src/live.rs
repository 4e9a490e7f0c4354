use std::error::Error;
use std::pin::Pin;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use config::Config;
use storage::{Storage, MAX_INSERT_ROWS};
use tokio::sync::{Mutex, Notify, Semaphore};
use tokio::time::{interval, Duration};
use tracing::{debug, error};
use types::{FeedUpdate, TransferRecord};

use crate::universe::TokenUniverse;

/// Staging buffer between the push feed and the sink.
///
/// Producers append and signal; a single background task (`run_flusher`)
/// drains. A flush detaches the whole buffer and writes it; a failed write
/// puts the detached records back at the front so nothing accepted is ever
/// dropped.
pub struct LiveBuffer {
    storage: Arc<dyn Storage>,
    universe: Arc<TokenUniverse>,
    buffer: Mutex<Vec<TransferRecord>>,
    // single-slot gate: a flush request while one is in flight is a no-op
    flush_gate: Semaphore,
    // threshold crossings wake the background flusher without the
    // producer waiting on the store
    flush_signal: Notify,
    last_checkpoint_slot: AtomicI64,
    live_batch_size: usize,
    checkpoint_interval: i64,
}

impl LiveBuffer {
    pub fn new(
        config: &Config,
        storage: Arc<dyn Storage>,
        universe: Arc<TokenUniverse>,
    ) -> Arc<Self> {
        Arc::new(Self {
            storage,
            universe,
            buffer: Mutex::new(Vec::new()),
            flush_gate: Semaphore::new(1),
            flush_signal: Notify::new(),
            last_checkpoint_slot: AtomicI64::new(0),
            live_batch_size: config.live_batch_size,
            checkpoint_interval: config.checkpoint_interval,
        })
    }

    /// Align the in-memory watermark with the stored checkpoint so the first
    /// advance happens a full interval past the resume point.
    pub fn set_checkpoint_watermark(&self, slot: i64) {
        self.last_checkpoint_slot.store(slot, Ordering::Release);
    }

    /// Accept one feed update: filter, buffer, and wake the flusher once the
    /// threshold is met. Never waits on the store.
    pub async fn push_update(&self, update: &FeedUpdate) {
        if update.transfers.is_empty() {
            return;
        }
        let universe = self.universe.snapshot().await;

        let buffered = {
            let mut buffer = self.buffer.lock().await;
            for (i, transfer) in update.transfers.iter().enumerate() {
                if !universe.contains(&transfer.mint) {
                    continue;
                }
                buffer.push(TransferRecord {
                    slot: update.slot,
                    signature: update.signature.clone(),
                    transfer_index: i as i32,
                    mint: transfer.mint.clone(),
                    from_account: transfer.from_account.clone(),
                    to_account: transfer.to_account.clone(),
                    amount: transfer.amount.clone(),
                    decimals: transfer.decimals,
                    block_time: update.block_time,
                });
            }
            buffer.len()
        };

        if buffered >= self.live_batch_size {
            self.flush_signal.notify_one();
        }

        self.maybe_advance_checkpoint(update.slot).await;
    }

    /// Detach the buffer and write it. Skips if a flush is already running.
    pub async fn flush(&self) {
        let _permit = match self.flush_gate.try_acquire() {
            Ok(permit) => permit,
            Err(_) => return,
        };

        let detached = {
            let mut buffer = self.buffer.lock().await;
            std::mem::take(&mut *buffer)
        };
        if detached.is_empty() {
            return;
        }

        match self.write_chunked(&detached).await {
            Ok(()) => debug!(rows = detached.len(), "committed live batch"),
            Err(err) => {
                error!(error = %err, rows = detached.len(), "live batch insert failed, re-buffering");
                // put the failed records back at the front, keeping rough
                // arrival order relative to what accumulated meanwhile
                let mut buffer = self.buffer.lock().await;
                let newer = std::mem::replace(&mut *buffer, detached);
                buffer.extend(newer);
            }
        }
    }

    /// Background consumer: flushes on threshold signals and on a fixed
    /// period, bounding time-to-durability during quiet stretches.
    pub async fn run_flusher(self: Arc<Self>, period: Duration) {
        let mut ticker = interval(period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.flush_signal.notified() => {}
            }
            self.flush().await;
        }
    }

    async fn write_chunked(
        &self,
        records: &[TransferRecord],
    ) -> Result<(), Pin<Box<dyn Error + Send + Sync>>> {
        for chunk in records.chunks(MAX_INSERT_ROWS) {
            self.storage.write_transfers(chunk).await?;
        }
        Ok(())
    }

    async fn maybe_advance_checkpoint(&self, slot: i64) {
        let last = self.last_checkpoint_slot.load(Ordering::Acquire);
        if slot - last < self.checkpoint_interval {
            return;
        }
        // The checkpoint records "accepted into the pipeline", not "durably
        // written". Replay after a crash re-delivers these slots and the
        // sink dedups on the natural key.
        match self.storage.advance_checkpoint(slot).await {
            Ok(()) => {
                self.last_checkpoint_slot.store(slot, Ordering::Release);
                debug!(slot, "advanced checkpoint");
            }
            Err(err) => {
                // retried on the next qualifying slot, never blocks ingestion
                error!(slot, error = %err, "failed to advance checkpoint");
            }
        }
    }

    #[cfg(test)]
    pub(crate) async fn buffered(&self) -> Vec<TransferRecord> {
        self.buffer.lock().await.clone()
    }
}
