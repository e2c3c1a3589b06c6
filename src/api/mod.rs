pub mod coingecko;
pub mod dexscreener;
pub mod jupiter;

pub use coingecko::CoinGeckoClient;
pub use dexscreener::{DexPrice, DexScreenerClient};
pub use jupiter::{JupiterClient, Quote};

use reqwest::Client;
use std::time::Duration;

/// Per-request deadline for every API client
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client that gives up on a stalled request after `timeout`
pub(crate) fn http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to build HTTP client with timeout, using defaults: {}", e);
            Client::new()
        })
}
