use std::sync::Arc;

use provider::PushFeed;
use storage::Storage;
use tracing::{error, info};

use crate::error::EtlError;
use crate::live::LiveBuffer;

/// Wires the push feed into the live buffer: resumes from the stored
/// checkpoint, seeds the streaming-start marker once, and forwards updates
/// until the feed closes or the caller drops the future.
pub struct StreamWorker {
    storage: Arc<dyn Storage>,
    feed: Arc<dyn PushFeed>,
    buffer: Arc<LiveBuffer>,
}

impl StreamWorker {
    pub fn new(
        storage: Arc<dyn Storage>,
        feed: Arc<dyn PushFeed>,
        buffer: Arc<LiveBuffer>,
    ) -> Self {
        Self {
            storage,
            feed,
            buffer,
        }
    }

    pub async fn run(&self) -> Result<(), EtlError> {
        let checkpoint = self.storage.checkpoint().await?;
        self.buffer
            .set_checkpoint_watermark(checkpoint.last_processed_slot);

        // failing to attach at all is fatal to the caller; feed errors after
        // that are not
        let mut updates = self.feed.subscribe(checkpoint.last_processed_slot).await?;
        info!(
            start_slot = checkpoint.last_processed_slot,
            "live stream attached"
        );

        let mut seeded = checkpoint.streaming_start_slot.is_some();
        while let Some(event) = updates.recv().await {
            match event {
                Ok(update) => {
                    if !seeded {
                        // marks where live coverage begins; set once, ever
                        match self.storage.seed_streaming_start(update.slot).await {
                            Ok(()) => seeded = true,
                            Err(err) => {
                                error!(error = %err, "failed to seed streaming start slot")
                            }
                        }
                    }
                    self.buffer.push_update(&update).await;
                }
                Err(err) => {
                    // the feed reconnects on its own; log and keep consuming
                    error!(error = %err, "feed error");
                }
            }
        }

        info!("feed closed");
        Ok(())
    }
}
