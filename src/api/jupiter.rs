use crate::{BotError, Result};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use super::{http_client, HTTP_TIMEOUT};

// Jupiter Swap API v1
// Docs: https://dev.jup.ag/docs/swap-api/get-quote
const JUPITER_QUOTE_API: &str = "https://lite-api.jup.ag/swap/v1";
const JUPITER_PRICE_API: &str = "https://lite-api.jup.ag/price/v2";

/// Client for Jupiter aggregator API
#[derive(Clone)]
pub struct JupiterClient {
    client: Client,
    quote_base: String,
    price_base: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    in_amount: String,
    out_amount: String,
    #[serde(default)]
    price_impact_pct: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    #[serde(default)]
    data: HashMap<String, Option<PriceEntry>>,
}

#[derive(Debug, Deserialize)]
struct PriceEntry {
    price: Option<PriceValue>,
}

/// v2 returns prices as strings, older versions as numbers
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PriceValue {
    Number(f64),
    Text(String),
}

/// Quote information from Jupiter
#[derive(Debug, Clone)]
pub struct Quote {
    pub in_amount: u64,  // Raw units of the input mint
    pub out_amount: u64, // Raw units of the output mint
    pub price_impact_pct: f64,
}

impl JupiterClient {
    pub fn new() -> Self {
        Self::with_base_urls(JUPITER_QUOTE_API, JUPITER_PRICE_API)
    }

    /// Point the client at other endpoints (mirrors, test servers)
    pub fn with_base_urls(quote_base: &str, price_base: &str) -> Self {
        Self {
            client: http_client(HTTP_TIMEOUT),
            quote_base: quote_base.trim_end_matches('/').to_string(),
            price_base: price_base.trim_end_matches('/').to_string(),
        }
    }

    /// Replace the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self
    }

    /// Get the USD price of a token, `None` when Jupiter has no data for it
    pub async fn get_price(&self, mint: &str) -> Result<Option<f64>> {
        let url = format!("{}?ids={}", self.price_base, mint);
        tracing::debug!("Jupiter price URL: {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BotError::Parse(format!(
                "Jupiter price API returned {}",
                status
            )));
        }

        let body: PriceResponse = response.json().await?;
        let entry = body.data.get(mint).and_then(|e| e.as_ref());
        let price = match entry.and_then(|e| e.price.as_ref()) {
            Some(PriceValue::Number(p)) => Some(*p),
            Some(PriceValue::Text(s)) => Some(s.parse::<f64>()?),
            None => None,
        };

        Ok(price)
    }

    /// Get a quote for swapping tokens
    ///
    /// # Arguments
    /// * `input_mint` - Input token mint address
    /// * `output_mint` - Output token mint address
    /// * `amount` - Amount in raw units (e.g., lamports for SOL)
    /// * `slippage_bps` - Slippage tolerance in basis points (50 = 0.5%)
    pub async fn get_quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
        slippage_bps: u16,
    ) -> Result<Quote> {
        let url = format!(
            "{}/quote?inputMint={}&outputMint={}&amount={}&slippageBps={}",
            self.quote_base, input_mint, output_mint, amount, slippage_bps
        );
        tracing::debug!("Jupiter quote URL: {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(BotError::Parse(format!(
                "Jupiter quote API returned {}: {}",
                status, text
            )));
        }

        let response: QuoteResponse = response.json().await?;
        tracing::debug!("Quote response: {:?}", response);

        let in_amount: u64 = response.in_amount.parse()?;
        let out_amount: u64 = response.out_amount.parse()?;
        let price_impact: f64 = response
            .price_impact_pct
            .as_deref()
            .and_then(|p| p.parse().ok())
            .unwrap_or(0.0);

        if in_amount == 0 {
            return Err(BotError::Parse("quote with zero input amount".to_string()));
        }

        Ok(Quote {
            in_amount,
            out_amount,
            price_impact_pct: price_impact,
        })
    }
}

impl Default for JupiterClient {
    fn default() -> Self {
        Self::new()
    }
}
