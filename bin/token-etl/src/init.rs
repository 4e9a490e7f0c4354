use std::{error::Error, pin::Pin, sync::Arc};

use clap::Parser;
use storage::Storage;
use tracing::info;

#[derive(Parser, Debug)]
pub struct InitArgs {}

impl InitArgs {
    pub async fn exec(
        &self,
        storage: Arc<dyn Storage>,
    ) -> Result<(), Pin<Box<dyn Error + Send + Sync>>> {
        storage.ping().await?;
        storage.prepare_db().await?;
        info!("database prepared");
        Ok(())
    }
}
