use std::{error::Error, pin::Pin, sync::Arc};

use clap::Parser;
use config::Config;
use etl::{resolve_universe, LiveBuffer, StreamWorker, TokenUniverse, UniverseRefresher};
use provider::{
    HistoryApi, HttpHistoryClient, HttpTokenDiscovery, PollingFeed, PushFeed, TokenDiscovery,
};
use storage::Storage;
use tokio::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
pub struct StreamArgs {
    /// Poll interval of the bundled polling feed, milliseconds
    #[clap(long, env, default_value = "2000")]
    pub feed_poll_ms: u64,
}

impl StreamArgs {
    pub async fn exec(
        &self,
        config: Config,
        storage: Arc<dyn Storage>,
    ) -> Result<(), Pin<Box<dyn Error + Send + Sync>>> {
        storage.ping().await?;
        storage.prepare_db().await?;

        // an empty universe at startup means nothing could ever be ingested
        let discovery: Arc<dyn TokenDiscovery> = Arc::new(HttpTokenDiscovery::new(
            config.discovery_url.clone(),
            config.discovery_api_key.clone(),
        ));
        let mints = resolve_universe(discovery.as_ref(), config.top_tokens).await?;
        info!(count = mints.len(), "resolved initial token universe");
        let universe = Arc::new(TokenUniverse::new(mints.iter().cloned().collect()));

        let refresher = UniverseRefresher::new(
            Arc::clone(&universe),
            Arc::clone(&discovery),
            Duration::from_secs(config.universe_refresh_secs),
            config.top_tokens,
        );
        tokio::spawn(refresher.run());

        let history: Arc<dyn HistoryApi> = Arc::new(HttpHistoryClient::new(
            config.history_url.clone(),
            config.history_api_key.clone(),
        ));
        let feed: Arc<dyn PushFeed> = Arc::new(PollingFeed::new(
            history,
            mints,
            Duration::from_millis(self.feed_poll_ms),
            config.page_limit,
        ));

        let buffer = LiveBuffer::new(&config, Arc::clone(&storage), universe);
        tokio::spawn(
            Arc::clone(&buffer).run_flusher(Duration::from_millis(config.flush_interval_ms)),
        );

        let worker = StreamWorker::new(storage, feed, buffer);
        tokio::select! {
            result = worker.run() => result?,
            _ = tokio::signal::ctrl_c() => {
                // transfers still staged in the buffer are abandoned here;
                // they come back on resume and dedup on the natural key
                info!("shutdown signal received, detaching from feed");
            }
        }
        Ok(())
    }
}
