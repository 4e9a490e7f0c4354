#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the transaction-history REST API
    pub history_url: String,

    /// API key sent with every history request
    pub history_api_key: String,

    /// URL of the ranked token-list endpoint
    pub discovery_url: String,

    /// API key for the token-discovery service
    pub discovery_api_key: String,

    /// Slot the checkpoint row is seeded with on first run
    pub genesis_slot: i64,

    /// Backfill ignores transactions older than this many days
    pub lookback_days: i64,

    /// Transactions requested per history page
    pub page_limit: usize,

    /// Backfill flushes its accumulated batch at this size
    pub db_batch_size: usize,

    /// Live buffer triggers a flush at this size
    pub live_batch_size: usize,

    /// Interval of the unconditional live-buffer flush timer, milliseconds
    pub flush_interval_ms: u64,

    /// Minimum slot distance between two checkpoint advances
    pub checkpoint_interval: i64,

    /// How often the token universe is re-resolved, seconds
    pub universe_refresh_secs: u64,

    /// The universe keeps this many top-ranked mints
    pub top_tokens: usize,

    /// Number of concurrent backfill workers
    pub backfill_concurrency: usize,

    /// Pacing delay between history pages, milliseconds
    pub page_delay_ms: u64,

    /// Attempts per history page before the mint's backfill is abandoned
    pub fetch_retries: u32,

    /// First retry delay, milliseconds; doubles per attempt
    pub retry_base_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            history_url: "https://api-mainnet.helius-rpc.com/v0/addresses".to_string(),
            history_api_key: String::new(),
            discovery_url: "https://public-api.birdeye.so/defi/v3/token/list".to_string(),
            discovery_api_key: String::new(),
            genesis_slot: 0,
            lookback_days: 30,
            page_limit: 100,
            db_batch_size: 500,
            live_batch_size: 200,
            flush_interval_ms: 500,
            checkpoint_interval: 100,
            universe_refresh_secs: 6 * 60 * 60,
            top_tokens: 50,
            backfill_concurrency: 6,
            page_delay_ms: 100,
            fetch_retries: 5,
            retry_base_ms: 500,
        }
    }
}
