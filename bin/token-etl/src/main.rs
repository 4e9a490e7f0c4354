mod logging;
use std::{error::Error, pin::Pin, sync::Arc};

use logging::init_logging;

mod init;
use init::InitArgs;

mod backfill;
use backfill::BackfillArgs;

mod stream;
use stream::StreamArgs;

use clap::{command, Parser, Subcommand};
use config::Config;
use dotenvy::dotenv;
use postgres_storage::{error::PostgresStorageError, PostgresStorage};
use storage::Storage;
use tracing::error;

/// Commands for the token-etl application
#[derive(Debug, Parser)]
#[clap(name = "token-etl", author, version, about)]
pub(crate) struct Args {
    /// Postgres DSN where transfers and the checkpoint are stored
    #[clap(short, long, env = "DATABASE_URL")]
    pub postgres_dsn: String,

    #[clap(short, long, env, default_value = "etl")]
    /// Prefix for the tables in the database
    /// This is useful when running multiple instances of the ETL
    pub tables_prefix: String,

    /// Base URL of the transaction-history API
    #[clap(
        long,
        env,
        default_value = "https://api-mainnet.helius-rpc.com/v0/addresses"
    )]
    pub history_url: String,

    /// API key for the transaction-history API
    #[clap(long, env = "HELIUS_API_KEY")]
    pub history_api_key: String,

    /// URL of the ranked token-list endpoint
    #[clap(
        long,
        env,
        default_value = "https://public-api.birdeye.so/defi/v3/token/list"
    )]
    pub discovery_url: String,

    /// API key for the token-discovery API
    #[clap(long, env = "BIRDEYE_API_KEY")]
    pub discovery_api_key: String,

    /// Slot the checkpoint is seeded with on first run
    #[clap(long, env, default_value = "0")]
    pub genesis_slot: i64,

    /// Number of concurrent backfill workers
    #[clap(long, env, default_value = "6")]
    pub backfill_concurrency: usize,

    /// Keep this many top-ranked mints in the token universe
    #[clap(long, env, default_value = "50")]
    pub top_tokens: usize,

    /// Backfill ignores transactions older than this many days
    #[clap(long, env, default_value = "30")]
    pub lookback_days: i64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
#[command(subcommand_help_heading = "Token-transfer ETL tool")]
pub enum Commands {
    /// Create tables, indexes and the checkpoint row
    Init(InitArgs),

    /// Backfill historical transfers for the token universe
    Backfill(BackfillArgs),

    /// Stream live transfers into storage
    Stream(StreamArgs),
}

impl Args {
    fn load_config(&self) -> Config {
        Config {
            history_url: self.history_url.clone(),
            history_api_key: self.history_api_key.clone(),
            discovery_url: self.discovery_url.clone(),
            discovery_api_key: self.discovery_api_key.clone(),
            genesis_slot: self.genesis_slot,
            backfill_concurrency: self.backfill_concurrency,
            top_tokens: self.top_tokens,
            lookback_days: self.lookback_days,
            ..Config::default()
        }
    }

    async fn connect_storage(&self) -> Result<Arc<dyn Storage>, Pin<Box<dyn Error + Send + Sync>>> {
        let storage = PostgresStorage::new(
            self.postgres_dsn.clone(),
            self.tables_prefix.clone(),
            self.genesis_slot,
        )
        .await
        .map_err(PostgresStorageError::from)?;
        Ok(Arc::new(storage))
    }

    pub(crate) async fn exec(&self) -> Result<(), Pin<Box<dyn Error + Send + Sync>>> {
        let config = self.load_config();
        // ingestion cannot proceed without the store
        let storage = match self.connect_storage().await {
            Ok(storage) => storage,
            Err(err) => {
                error!(error = %err, "failed to connect to storage");
                return Err(err);
            }
        };

        match &self.command {
            Commands::Init(init_args) => init_args.exec(storage).await,
            Commands::Backfill(backfill_args) => backfill_args.exec(config, storage).await,
            Commands::Stream(stream_args) => stream_args.exec(config, storage).await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Pin<Box<dyn Error + Send + Sync>>> {
    init_logging();
    dotenv().ok();

    let cmd = Args::parse();
    cmd.exec().await
}
