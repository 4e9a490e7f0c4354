use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One row of the token_transfers table.
///
/// `(signature, transfer_index)` is the natural key: a transaction may carry
/// several transfers, and `transfer_index` is the zero-based position of this
/// transfer inside the transaction's transfer list.
#[derive(Debug, FromRow, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub slot: i64,
    pub signature: String,
    pub transfer_index: i32,
    pub mint: String,
    pub from_account: Option<String>,
    pub to_account: Option<String>,
    /// Decimal string. Ledger amounts can exceed the safe range of any
    /// native numeric type, so the raw string is stored as-is.
    pub amount: String,
    pub decimals: i32,
    /// Wall-clock time of the containing block. Used only for the
    /// lookback-window boundary, never for ordering.
    pub block_time: DateTime<Utc>,
}
