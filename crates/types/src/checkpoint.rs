use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Singleton pipeline-state row (id = 1).
///
/// `last_processed_slot` only ever moves forward; `streaming_start_slot` is
/// set once when the live stream first attaches and never overwritten.
#[derive(Debug, FromRow, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub last_processed_slot: i64,
    pub streaming_start_slot: Option<i64>,
    pub last_updated: DateTime<Utc>,
}
