use serde::{Deserialize, Serialize};

/// One row of the ranked token list returned by the discovery API,
/// liquidity-sorted descending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenInfo {
    pub address: String,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub liquidity: Option<f64>,
}
