use crate::{BotError, Result};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use super::{http_client, HTTP_TIMEOUT};

const COINGECKO_API_BASE: &str = "https://api.coingecko.com/api/v3";
const RATE_LIMIT_RPM: u32 = 30; // Demo API: 30 requests per minute

// Type alias for the rate limiter to simplify signatures
type CoinGeckoRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// CoinGecko token price client with rate limiting
///
/// Cloneable to share across engines; all clones share the same rate limiter.
#[derive(Clone)]
pub struct CoinGeckoClient {
    client: Client,
    api_key: String,
    base_url: String,
    platform: String,
    rate_limiter: Arc<CoinGeckoRateLimiter>,
}

impl CoinGeckoClient {
    /// `platform` is CoinGecko's asset platform id, e.g. "ethereum" or "solana"
    pub fn new(api_key: String, platform: &str) -> Self {
        Self::with_base_url(api_key, platform, COINGECKO_API_BASE)
    }

    pub fn with_base_url(api_key: String, platform: &str, base_url: &str) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(RATE_LIMIT_RPM).unwrap_or(NonZeroU32::MIN));

        Self {
            client: http_client(HTTP_TIMEOUT),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            platform: platform.to_string(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Replace the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self
    }

    /// USD price for a token contract, `None` when CoinGecko does not list it
    pub async fn get_token_price(&self, contract_address: &str) -> Result<Option<f64>> {
        self.rate_limiter.until_ready().await;

        let url = format!(
            "{}/simple/token_price/{}?contract_addresses={}&vs_currencies=usd&x_cg_demo_api_key={}",
            self.base_url, self.platform, contract_address, self.api_key
        );

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if status.as_u16() == 429 {
            tracing::warn!("Rate limited by CoinGecko (429)");
            return Err(BotError::Parse("CoinGecko rate limit exceeded".to_string()));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(BotError::Parse(format!(
                "CoinGecko API error ({}): {}",
                status, text
            )));
        }

        // Keys come back lowercased for EVM addresses
        let prices: HashMap<String, HashMap<String, f64>> = response.json().await?;
        let price = prices
            .get(contract_address)
            .or_else(|| prices.get(&contract_address.to_lowercase()))
            .and_then(|quotes| quotes.get("usd"))
            .copied();

        tracing::debug!("CoinGecko price for {}: {:?}", contract_address, price);
        Ok(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const TOKEN: &str = "0x6982508145454Ce325dDbE47a25d4ec3d2311933";

    #[tokio::test]
    async fn test_get_token_price_lowercased_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/simple/token_price/ethereum")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("contract_addresses".into(), TOKEN.into()),
                Matcher::UrlEncoded("vs_currencies".into(), "usd".into()),
                Matcher::UrlEncoded("x_cg_demo_api_key".into(), "demo".into()),
            ]))
            .with_status(200)
            .with_body(format!(r#"{{"{}":{{"usd":0.00001234}}}}"#, TOKEN.to_lowercase()))
            .create_async()
            .await;

        let client = CoinGeckoClient::with_base_url("demo".to_string(), "ethereum", &server.url());
        let price = client.get_token_price(TOKEN).await.unwrap();

        mock.assert_async().await;
        assert_eq!(price, Some(0.00001234));
    }

    #[tokio::test]
    async fn test_get_token_price_unknown_token() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/simple/token_price/ethereum")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let client = CoinGeckoClient::with_base_url("demo".to_string(), "ethereum", &server.url());
        assert_eq!(client.get_token_price(TOKEN).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rate_limited_response_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/simple/token_price/ethereum")
            .match_query(Matcher::Any)
            .with_status(429)
            .create_async()
            .await;

        let client = CoinGeckoClient::with_base_url("demo".to_string(), "ethereum", &server.url());
        let err = client.get_token_price(TOKEN).await.unwrap_err();
        assert!(err.to_string().contains("rate limit"));
    }
}
