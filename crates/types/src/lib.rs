pub mod transfer;
pub use transfer::TransferRecord;

pub mod checkpoint;
pub use checkpoint::Checkpoint;

pub mod feed;
pub use feed::{FeedUpdate, HistoryTransaction, RawTransfer};

pub mod token;
pub use token::TokenInfo;
