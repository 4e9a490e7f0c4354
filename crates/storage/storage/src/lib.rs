pub mod storage;
pub use storage::{Storage, MAX_INSERT_ROWS};
