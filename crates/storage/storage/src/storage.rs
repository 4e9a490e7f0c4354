use std::{error::Error, pin::Pin};
use types::{Checkpoint, TransferRecord};

use async_trait::async_trait;

/// Upper bound on rows per `write_transfers` call. Larger batches must be
/// split by the caller; implementations reject them instead of chunking.
pub const MAX_INSERT_ROWS: usize = 1000;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Create tables and indexes if absent and seed the singleton checkpoint
    /// row. Idempotent.
    async fn prepare_db(&self) -> Result<(), Pin<Box<dyn Error + Send + Sync>>>;

    /// Connectivity check used at startup.
    async fn ping(&self) -> Result<(), Pin<Box<dyn Error + Send + Sync>>>;

    /// Insert a batch of transfers in one statement. Conflicts on the
    /// `(signature, transfer_index)` natural key are silently ignored, so
    /// the call is safe to retry wholesale. Empty input is a no-op.
    async fn write_transfers(
        &self,
        transfers: &[TransferRecord],
    ) -> Result<(), Pin<Box<dyn Error + Send + Sync>>>;

    async fn checkpoint(&self) -> Result<Checkpoint, Pin<Box<dyn Error + Send + Sync>>>;

    /// Move `last_processed_slot` forward. A slot at or below the stored
    /// value leaves the row untouched; the checkpoint never regresses.
    async fn advance_checkpoint(
        &self,
        slot: i64,
    ) -> Result<(), Pin<Box<dyn Error + Send + Sync>>>;

    /// Set `streaming_start_slot` if it is still unset. Idempotent.
    async fn seed_streaming_start(
        &self,
        slot: i64,
    ) -> Result<(), Pin<Box<dyn Error + Send + Sync>>>;
}
