use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One transfer as delivered by an upstream source, before the universe
/// filter has been applied and before a `transfer_index` has been assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransfer {
    pub mint: String,
    pub from_account: Option<String>,
    pub to_account: Option<String>,
    pub amount: String,
    pub decimals: i32,
}

/// One confirmed-transaction update from the live push feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedUpdate {
    pub slot: i64,
    pub signature: String,
    pub block_time: DateTime<Utc>,
    pub transfers: Vec<RawTransfer>,
}

/// One element of a History API page. Pages are ordered newest-first;
/// `timestamp` is unix seconds, 0 when the source omitted it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryTransaction {
    pub signature: String,
    pub slot: i64,
    pub timestamp: i64,
    pub transfers: Vec<RawTransfer>,
}
