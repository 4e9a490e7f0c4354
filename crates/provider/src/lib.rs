pub mod error;
pub use error::ProviderError;

pub mod provider;
pub use provider::{HistoryApi, HttpHistoryClient, HttpTokenDiscovery, TokenDiscovery};

pub mod feed;
pub use feed::{PollingFeed, PushFeed};
