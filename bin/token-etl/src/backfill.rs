use std::{error::Error, pin::Pin, sync::Arc};

use clap::Parser;
use config::Config;
use etl::{resolve_universe, BackfillEngine, TokenUniverse};
use provider::{HistoryApi, HttpHistoryClient, HttpTokenDiscovery};
use storage::Storage;
use tracing::info;

#[derive(Parser, Debug)]
pub struct BackfillArgs {
    /// Backfill only these mints instead of the discovered universe
    #[clap(long, value_parser, num_args = 1.., value_delimiter = ',')]
    pub mints: Vec<String>,
}

impl BackfillArgs {
    pub async fn exec(
        &self,
        config: Config,
        storage: Arc<dyn Storage>,
    ) -> Result<(), Pin<Box<dyn Error + Send + Sync>>> {
        storage.ping().await?;
        storage.prepare_db().await?;

        let mints = if self.mints.is_empty() {
            let discovery = HttpTokenDiscovery::new(
                config.discovery_url.clone(),
                config.discovery_api_key.clone(),
            );
            resolve_universe(&discovery, config.top_tokens).await?
        } else {
            self.mints.clone()
        };
        info!(count = mints.len(), "resolved token universe");

        let universe = Arc::new(TokenUniverse::new(mints.iter().cloned().collect()));
        let history: Arc<dyn HistoryApi> = Arc::new(HttpHistoryClient::new(
            config.history_url.clone(),
            config.history_api_key.clone(),
        ));

        let engine = BackfillEngine::new(config, storage, history, universe);
        engine.run(mints).await;
        Ok(())
    }
}
