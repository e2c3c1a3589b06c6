use crate::{BotError, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{http_client, HTTP_TIMEOUT};

const DEXSCREENER_API_BASE: &str = "https://api.dexscreener.com/latest/dex";

/// Client for DexScreener API
#[derive(Clone)]
pub struct DexScreenerClient {
    client: Client,
    base_url: String,
    chain_id: String,
}

#[derive(Debug, Deserialize)]
struct DexScreenerResponse {
    #[serde(default)]
    pairs: Option<Vec<PairData>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PairData {
    chain_id: String,
    base_token: TokenInfo,
    price_usd: Option<String>,
    #[serde(default)]
    volume: VolumeData,
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    symbol: String,
    address: String,
}

#[derive(Debug, Deserialize, Default)]
struct VolumeData {
    #[serde(default)]
    h24: f64,
}

/// Price of a token on its most liquid pair
#[derive(Debug, Clone, PartialEq)]
pub struct DexPrice {
    pub symbol: String,
    pub price: f64,
    pub volume_24h: f64,
}

impl DexScreenerClient {
    pub fn new() -> Self {
        Self::with_base_url(DEXSCREENER_API_BASE)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: http_client(HTTP_TIMEOUT),
            base_url: base_url.trim_end_matches('/').to_string(),
            chain_id: "solana".to_string(),
        }
    }

    /// Replace the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self
    }

    /// Only consider pairs on this chain (default "solana")
    pub fn with_chain(mut self, chain_id: &str) -> Self {
        self.chain_id = chain_id.to_string();
        self
    }

    /// Get current price for a token by its mint address.
    ///
    /// Single attempt: callers decide when to ask again.
    pub async fn get_price(&self, token_address: &str) -> Result<Option<DexPrice>> {
        let url = format!("{}/tokens/{}", self.base_url, token_address);

        let response_raw = self.client.get(&url).send().await?;
        let status = response_raw.status();
        if !status.is_success() {
            return Err(BotError::Parse(format!("DexScreener returned {}", status)));
        }
        let response: DexScreenerResponse = response_raw.json().await?;

        // DexScreener lists pairs by liquidity; take the first one on our chain
        // where the token is the base asset
        let pair = response.pairs.unwrap_or_default().into_iter().find(|p| {
            p.chain_id == self.chain_id && p.base_token.address.eq_ignore_ascii_case(token_address)
        });

        let pair = match pair {
            Some(pair) => pair,
            None => return Ok(None),
        };

        let price = match pair.price_usd {
            Some(p) => p.parse::<f64>()?,
            None => return Ok(None),
        };

        Ok(Some(DexPrice {
            symbol: pair.base_token.symbol,
            price,
            volume_24h: pair.volume.h24,
        }))
    }
}

impl Default for DexScreenerClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIF: &str = "EKpQGSJtjMFqKZ9KQanSqYXRcF8fBopzLHYxdM65zcjm";

    fn pair(chain: &str, address: &str, price: &str) -> String {
        format!(
            r#"{{"chainId":"{}","dexId":"raydium","baseToken":{{"address":"{}","name":"dogwifhat","symbol":"WIF"}},"quoteToken":{{"address":"So11111111111111111111111111111111111111112","symbol":"SOL"}},"priceUsd":"{}","volume":{{"h24":1520000.5}}}}"#,
            chain, address, price
        )
    }

    #[tokio::test]
    async fn test_get_price_picks_chain_pair() {
        let mut server = mockito::Server::new_async().await;
        let body = format!(
            r#"{{"schemaVersion":"1.0.0","pairs":[{},{}]}}"#,
            pair("base", WIF, "9.99"),
            pair("solana", WIF, "2.345")
        );
        let mock = server
            .mock("GET", format!("/tokens/{}", WIF).as_str())
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let client = DexScreenerClient::with_base_url(&server.url());
        let price = client.get_price(WIF).await.unwrap().unwrap();

        mock.assert_async().await;
        assert_eq!(price.symbol, "WIF");
        assert_eq!(price.price, 2.345);
        assert_eq!(price.volume_24h, 1520000.5);
    }

    #[tokio::test]
    async fn test_get_price_no_pairs() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", format!("/tokens/{}", WIF).as_str())
            .with_status(200)
            .with_body(r#"{"schemaVersion":"1.0.0","pairs":null}"#)
            .create_async()
            .await;

        let client = DexScreenerClient::with_base_url(&server.url());
        assert_eq!(client.get_price(WIF).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_price_server_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", format!("/tokens/{}", WIF).as_str())
            .with_status(500)
            .create_async()
            .await;

        let client = DexScreenerClient::with_base_url(&server.url());
        assert!(client.get_price(WIF).await.is_err());
    }

    #[tokio::test]
    async fn test_get_price_unparseable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", format!("/tokens/{}", WIF).as_str())
            .with_status(200)
            .with_body(format!(r#"{{"pairs":[{}]}}"#, pair("solana", WIF, "n/a")))
            .create_async()
            .await;

        let client = DexScreenerClient::with_base_url(&server.url());
        let err = client.get_price(WIF).await.unwrap_err();
        assert!(matches!(err, BotError::Parse(_)));
    }

    #[test]
    fn test_client_creation() {
        let client = DexScreenerClient::new().with_chain("ethereum");
        assert_eq!(client.chain_id, "ethereum");
        assert_eq!(client.base_url, DEXSCREENER_API_BASE);
    }
}
