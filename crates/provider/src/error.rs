use std::{error::Error, pin::Pin};

use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum ProviderError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("history api returned {status}: {body}")]
    HistoryApi { status: u16, body: String },

    #[error("token discovery returned an unsuccessful response")]
    DiscoveryUnsuccessful,

    #[error("token discovery returned an empty list")]
    EmptyTokenList,
}

impl From<ProviderError> for Pin<Box<dyn Error + Send + Sync>> {
    fn from(err: ProviderError) -> Self {
        Pin::from(Box::new(err))
    }
}
