use std::{error::Error, pin::Pin};

use storage::MAX_INSERT_ROWS;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum PostgresStorageError {
    #[error(transparent)]
    DatabaseError(#[from] sqlx::Error),

    #[error("batch of {0} rows exceeds the {MAX_INSERT_ROWS}-row insert limit")]
    BatchTooLarge(usize),
}

impl From<PostgresStorageError> for Pin<Box<dyn Error + Send + Sync>> {
    fn from(err: PostgresStorageError) -> Self {
        Pin::from(Box::new(err))
    }
}
