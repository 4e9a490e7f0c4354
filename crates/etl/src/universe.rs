use std::collections::HashSet;
use std::sync::Arc;

use provider::{ProviderError, TokenDiscovery};
use tokio::sync::RwLock;
use tokio::time::{interval, Duration};
use tracing::{error, info};

/// Shared filter set of "major" mints.
///
/// Readers take an `Arc` snapshot and hold it for as long as they need a
/// consistent view (a whole backfill pass, one feed update); `replace` swaps
/// the whole set atomically, so a reader sees the old set or the new one,
/// never a mix.
pub struct TokenUniverse {
    mints: RwLock<Arc<HashSet<String>>>,
}

impl TokenUniverse {
    pub fn new(initial: HashSet<String>) -> Self {
        Self {
            mints: RwLock::new(Arc::new(initial)),
        }
    }

    pub async fn snapshot(&self) -> Arc<HashSet<String>> {
        Arc::clone(&*self.mints.read().await)
    }

    pub async fn replace(&self, mints: HashSet<String>) {
        *self.mints.write().await = Arc::new(mints);
    }
}

/// Fetch the ranked token list and keep the top `top_tokens` addresses.
/// An empty list is an error: staleness beats an empty filter set, which
/// would silently drop every transfer.
pub async fn resolve_universe(
    discovery: &dyn TokenDiscovery,
    top_tokens: usize,
) -> Result<Vec<String>, ProviderError> {
    let tokens = discovery.list_tokens().await?;
    if tokens.is_empty() {
        return Err(ProviderError::EmptyTokenList);
    }
    Ok(tokens
        .into_iter()
        .take(top_tokens)
        .map(|t| t.address)
        .collect())
}

/// Periodically re-resolves the universe. On failure the previous set stays
/// in effect.
pub struct UniverseRefresher {
    universe: Arc<TokenUniverse>,
    discovery: Arc<dyn TokenDiscovery>,
    refresh_interval: Duration,
    top_tokens: usize,
}

impl UniverseRefresher {
    pub fn new(
        universe: Arc<TokenUniverse>,
        discovery: Arc<dyn TokenDiscovery>,
        refresh_interval: Duration,
        top_tokens: usize,
    ) -> Self {
        Self {
            universe,
            discovery,
            refresh_interval,
            top_tokens,
        }
    }

    pub async fn run(self) {
        let mut ticker = interval(self.refresh_interval);
        // the first tick completes immediately; the caller already resolved
        // the initial set
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match resolve_universe(self.discovery.as_ref(), self.top_tokens).await {
                Ok(mints) => {
                    info!(count = mints.len(), "refreshed token universe");
                    self.universe.replace(mints.into_iter().collect()).await;
                }
                Err(err) => {
                    error!(error = %err, "failed to refresh token universe, keeping previous set");
                }
            }
        }
    }
}
