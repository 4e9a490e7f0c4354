use std::{error::Error, pin::Pin};

use provider::ProviderError;

#[derive(Debug, thiserror::Error)]
pub enum EtlError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("storage error: {0}")]
    Storage(Pin<Box<dyn Error + Send + Sync>>),

    #[error("page fetch failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        source: ProviderError,
    },
}

impl From<Pin<Box<dyn Error + Send + Sync>>> for EtlError {
    fn from(err: Pin<Box<dyn Error + Send + Sync>>) -> Self {
        EtlError::Storage(err)
    }
}

impl From<EtlError> for Pin<Box<dyn Error + Send + Sync>> {
    fn from(err: EtlError) -> Self {
        Pin::from(Box::new(err))
    }
}
