use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::Duration;
use tracing::warn;
use types::{HistoryTransaction, RawTransfer, TokenInfo};

use crate::error::ProviderError;

/// Paginated REST access to an address's transaction history.
/// An empty page signals exhaustion.
#[async_trait]
pub trait HistoryApi: Send + Sync {
    async fn fetch_page(
        &self,
        mint: &str,
        before: Option<&str>,
        limit: usize,
    ) -> Result<Vec<HistoryTransaction>, ProviderError>;
}

/// Ranked token list, liquidity-sorted descending.
#[async_trait]
pub trait TokenDiscovery: Send + Sync {
    async fn list_tokens(&self) -> Result<Vec<TokenInfo>, ProviderError>;
}

pub struct HttpHistoryClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpHistoryClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl HistoryApi for HttpHistoryClient {
    async fn fetch_page(
        &self,
        mint: &str,
        before: Option<&str>,
        limit: usize,
    ) -> Result<Vec<HistoryTransaction>, ProviderError> {
        let mut url = format!(
            "{}/{}/transactions?api-key={}&type=TRANSFER&limit={}",
            self.base_url, mint, self.api_key, limit
        );
        if let Some(before) = before {
            url.push_str("&before=");
            url.push_str(before);
        }

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::HistoryApi { status, body });
        }

        let payload: Vec<TransactionPayload> = response.json().await?;
        Ok(payload.into_iter().map(map_transaction).collect())
    }
}

pub struct HttpTokenDiscovery {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl HttpTokenDiscovery {
    pub fn new(url: String, api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            url,
            api_key,
        }
    }
}

#[async_trait]
impl TokenDiscovery for HttpTokenDiscovery {
    async fn list_tokens(&self) -> Result<Vec<TokenInfo>, ProviderError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("sort_by", "liquidity"),
                ("sort_type", "desc"),
                ("limit", "100"),
            ])
            .header("x-chain", "solana")
            .header("accept", "application/json")
            .header("X-API-KEY", &self.api_key)
            .send()
            .await?;

        let payload: TokenListResponse = response.json().await?;
        if !payload.success {
            return Err(ProviderError::DiscoveryUnsuccessful);
        }
        Ok(payload.data.items)
    }
}

#[derive(Debug, Deserialize)]
struct TokenListResponse {
    success: bool,
    data: TokenListData,
}

#[derive(Debug, Deserialize)]
struct TokenListData {
    items: Vec<TokenInfo>,
}

#[derive(Debug, Deserialize)]
struct TransactionPayload {
    signature: String,
    slot: i64,
    #[serde(default)]
    timestamp: i64,
    #[serde(rename = "tokenTransfers", default)]
    token_transfers: Vec<TransferPayload>,
}

#[derive(Debug, Deserialize)]
struct TransferPayload {
    mint: Option<String>,
    #[serde(rename = "fromUserAccount")]
    from_user_account: Option<String>,
    #[serde(rename = "toUserAccount")]
    to_user_account: Option<String>,
    #[serde(rename = "tokenAmount")]
    token_amount: Option<serde_json::Value>,
    #[serde(rename = "tokenAmountDecimals", default)]
    token_amount_decimals: i32,
}

fn map_transaction(payload: TransactionPayload) -> HistoryTransaction {
    let signature = payload.signature;
    let transfers = payload
        .token_transfers
        .into_iter()
        .filter_map(|t| match map_transfer(t) {
            Some(transfer) => Some(transfer),
            None => {
                warn!(signature = %signature, "dropping malformed transfer");
                None
            }
        })
        .collect();
    HistoryTransaction {
        signature,
        slot: payload.slot,
        timestamp: payload.timestamp,
        transfers,
    }
}

fn map_transfer(payload: TransferPayload) -> Option<RawTransfer> {
    let mint = payload.mint?;
    // Amounts arrive as JSON numbers or strings; either way the decimal
    // string is kept verbatim, never parsed into a float.
    let amount = match payload.token_amount? {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s,
        _ => return None,
    };
    Some(RawTransfer {
        mint,
        from_account: payload.from_user_account,
        to_account: payload.to_user_account,
        amount,
        decimals: payload.token_amount_decimals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_a_history_transaction() {
        let payload: TransactionPayload = serde_json::from_value(json!({
            "signature": "sig1",
            "slot": 12345,
            "timestamp": 1700000000,
            "tokenTransfers": [
                {
                    "mint": "MintA",
                    "fromUserAccount": "alice",
                    "toUserAccount": "bob",
                    "tokenAmount": 1500.25,
                    "tokenAmountDecimals": 6
                },
                {
                    "mint": "MintB",
                    "tokenAmount": "98765432109876543210",
                    "tokenAmountDecimals": 9
                }
            ]
        }))
        .unwrap();

        let txn = map_transaction(payload);
        assert_eq!(txn.signature, "sig1");
        assert_eq!(txn.slot, 12345);
        assert_eq!(txn.transfers.len(), 2);
        assert_eq!(txn.transfers[0].amount, "1500.25");
        assert_eq!(txn.transfers[0].from_account.as_deref(), Some("alice"));
        assert_eq!(txn.transfers[1].amount, "98765432109876543210");
        assert_eq!(txn.transfers[1].from_account, None);
    }

    #[test]
    fn drops_transfer_missing_amount_keeps_the_rest() {
        let payload: TransactionPayload = serde_json::from_value(json!({
            "signature": "sig2",
            "slot": 1,
            "timestamp": 1700000000,
            "tokenTransfers": [
                { "mint": "MintA" },
                { "mint": "MintB", "tokenAmount": 7, "tokenAmountDecimals": 0 }
            ]
        }))
        .unwrap();

        let txn = map_transaction(payload);
        assert_eq!(txn.transfers.len(), 1);
        assert_eq!(txn.transfers[0].mint, "MintB");
    }

    #[test]
    fn missing_timestamp_defaults_to_zero() {
        let payload: TransactionPayload = serde_json::from_value(json!({
            "signature": "sig3",
            "slot": 2
        }))
        .unwrap();
        assert_eq!(payload.timestamp, 0);
        assert!(payload.token_transfers.is_empty());
    }

    #[test]
    fn decodes_the_token_list_envelope() {
        let payload: TokenListResponse = serde_json::from_value(json!({
            "success": true,
            "data": {
                "items": [
                    { "address": "MintA", "symbol": "AAA", "name": "Token A", "liquidity": 123456.78 },
                    { "address": "MintB" }
                ]
            }
        }))
        .unwrap();
        assert!(payload.success);
        assert_eq!(payload.data.items.len(), 2);
        assert_eq!(payload.data.items[0].address, "MintA");
        assert_eq!(payload.data.items[1].liquidity, None);
    }
}
