use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use provider::{HistoryApi, ProviderError};
use types::{HistoryTransaction, RawTransfer};

/// History API stub fed with a per-mint script of page results. Once a
/// mint's script is exhausted it serves empty pages.
pub(crate) struct ScriptedHistory {
    pages: Mutex<HashMap<String, VecDeque<Result<Vec<HistoryTransaction>, ()>>>>,
    fetch_calls: AtomicUsize,
}

impl ScriptedHistory {
    pub(crate) fn new() -> Self {
        Self {
            pages: Mutex::new(HashMap::new()),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn script_page(&self, mint: &str, page: Vec<HistoryTransaction>) {
        self.pages
            .lock()
            .unwrap()
            .entry(mint.to_string())
            .or_default()
            .push_back(Ok(page));
    }

    pub(crate) fn script_error(&self, mint: &str) {
        self.pages
            .lock()
            .unwrap()
            .entry(mint.to_string())
            .or_default()
            .push_back(Err(()));
    }

    pub(crate) fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HistoryApi for ScriptedHistory {
    async fn fetch_page(
        &self,
        mint: &str,
        _before: Option<&str>,
        _limit: usize,
    ) -> Result<Vec<HistoryTransaction>, ProviderError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .pages
            .lock()
            .unwrap()
            .get_mut(mint)
            .and_then(|queue| queue.pop_front());
        match next {
            Some(Ok(page)) => Ok(page),
            Some(Err(())) => Err(ProviderError::HistoryApi {
                status: 500,
                body: "scripted failure".to_string(),
            }),
            None => Ok(vec![]),
        }
    }
}

pub(crate) fn raw_transfer(mint: &str, amount: &str) -> RawTransfer {
    RawTransfer {
        mint: mint.to_string(),
        from_account: Some("alice".to_string()),
        to_account: Some("bob".to_string()),
        amount: amount.to_string(),
        decimals: 6,
    }
}

pub(crate) fn history_txn(
    signature: &str,
    slot: i64,
    timestamp: i64,
    transfers: Vec<RawTransfer>,
) -> HistoryTransaction {
    HistoryTransaction {
        signature: signature.to_string(),
        slot,
        timestamp,
        transfers,
    }
}
