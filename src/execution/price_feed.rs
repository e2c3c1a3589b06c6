use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::api::{CoinGeckoClient, DexScreenerClient, JupiterClient};
use crate::config::{EngineConfig, PriceSource};
use crate::models::Instrument;
use crate::{BotError, Result};

/// Source of current prices for an instrument
///
/// `Ok(None)` means the source answered but has no price; errors are
/// transport or parse failures. Implementations must not retry internally.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn get_price(&self, instrument: &Instrument) -> Result<Option<f64>>;

    fn name(&self) -> &str;
}

#[async_trait]
impl PriceOracle for JupiterClient {
    async fn get_price(&self, instrument: &Instrument) -> Result<Option<f64>> {
        JupiterClient::get_price(self, &instrument.mint).await
    }

    fn name(&self) -> &str {
        "jupiter"
    }
}

#[async_trait]
impl PriceOracle for DexScreenerClient {
    async fn get_price(&self, instrument: &Instrument) -> Result<Option<f64>> {
        let price = DexScreenerClient::get_price(self, &instrument.mint).await?;
        if let Some(p) = &price {
            tracing::debug!(
                instrument = %instrument,
                pair_symbol = %p.symbol,
                volume_24h = p.volume_24h,
                "DexScreener pair"
            );
        }
        Ok(price.map(|p| p.price))
    }

    fn name(&self) -> &str {
        "dexscreener"
    }
}

#[async_trait]
impl PriceOracle for CoinGeckoClient {
    async fn get_price(&self, instrument: &Instrument) -> Result<Option<f64>> {
        self.get_token_price(&instrument.mint).await
    }

    fn name(&self) -> &str {
        "coingecko"
    }
}

/// Asks each source in order and returns the first usable price
///
/// One pass per call. Errors only when every source failed; if at least one
/// source answered without data the result is `Ok(None)`. A source that
/// outlives its deadline counts as failed and the next one is asked.
pub struct FallbackOracle {
    sources: Vec<Arc<dyn PriceOracle>>,
    source_timeout: Option<Duration>,
}

impl FallbackOracle {
    pub fn new(sources: Vec<Arc<dyn PriceOracle>>) -> Self {
        Self {
            sources,
            source_timeout: None,
        }
    }

    /// Give each source at most `source_timeout` before moving on
    pub fn with_source_timeout(mut self, source_timeout: Duration) -> Self {
        self.source_timeout = Some(source_timeout);
        self
    }

    /// Build the source chain named in the engine config
    ///
    /// The engine's price timeout is split evenly across the sources so a
    /// stalled first source still leaves time for the rest.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let budget = config.timings().price_timeout;
        let per_source = budget / config.price_sources.len().max(1) as u32;
        let mut sources: Vec<Arc<dyn PriceOracle>> = Vec::new();

        for source in &config.price_sources {
            let oracle: Arc<dyn PriceOracle> = match source {
                PriceSource::Jupiter => Arc::new(JupiterClient::new().with_timeout(per_source)),
                PriceSource::DexScreener => {
                    Arc::new(DexScreenerClient::new().with_timeout(per_source))
                }
                PriceSource::CoinGecko => {
                    let api_key = config.coingecko_api_key.clone().ok_or_else(|| {
                        BotError::ConfigInvalid(
                            "coingecko price source needs coingecko_api_key".to_string(),
                        )
                    })?;
                    Arc::new(
                        CoinGeckoClient::new(api_key, &config.coingecko_platform)
                            .with_timeout(per_source),
                    )
                }
            };
            sources.push(oracle);
        }

        Ok(Self::new(sources).with_source_timeout(per_source))
    }

    pub fn source_timeout(&self) -> Option<Duration> {
        self.source_timeout
    }

    async fn ask(
        &self,
        source: &dyn PriceOracle,
        instrument: &Instrument,
    ) -> Result<Option<f64>> {
        match self.source_timeout {
            Some(limit) => timeout(limit, source.get_price(instrument))
                .await
                .map_err(|_| {
                    BotError::feed_unavailable(
                        &instrument.symbol,
                        format!("timed out after {:?}", limit),
                    )
                })?,
            None => source.get_price(instrument).await,
        }
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }
}

#[async_trait]
impl PriceOracle for FallbackOracle {
    async fn get_price(&self, instrument: &Instrument) -> Result<Option<f64>> {
        let mut failures = Vec::new();
        let mut answered = false;

        for source in &self.sources {
            match self.ask(source.as_ref(), instrument).await {
                Ok(Some(price)) if price.is_finite() && price > 0.0 => {
                    tracing::debug!(
                        instrument = %instrument,
                        source = source.name(),
                        price,
                        "Price from source"
                    );
                    return Ok(Some(price));
                }
                Ok(Some(price)) => {
                    tracing::warn!(
                        instrument = %instrument,
                        source = source.name(),
                        price,
                        "Ignoring invalid price"
                    );
                    answered = true;
                }
                Ok(None) => {
                    tracing::debug!(
                        instrument = %instrument,
                        source = source.name(),
                        "No price data"
                    );
                    answered = true;
                }
                Err(e) => {
                    tracing::warn!(
                        instrument = %instrument,
                        source = source.name(),
                        "Price source failed: {}",
                        e
                    );
                    failures.push(format!("{}: {}", source.name(), e));
                }
            }
        }

        if answered || failures.is_empty() {
            Ok(None)
        } else {
            Err(BotError::feed_unavailable(&instrument.symbol, failures.join("; ")))
        }
    }

    fn name(&self) -> &str {
        "fallback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubOracle {
        name: &'static str,
        reply: fn() -> Result<Option<f64>>,
        calls: AtomicUsize,
    }

    impl StubOracle {
        fn new(name: &'static str, reply: fn() -> Result<Option<f64>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                reply,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PriceOracle for StubOracle {
        async fn get_price(&self, _instrument: &Instrument) -> Result<Option<f64>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.reply)()
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    struct StalledOracle;

    #[async_trait]
    impl PriceOracle for StalledOracle {
        async fn get_price(&self, _instrument: &Instrument) -> Result<Option<f64>> {
            std::future::pending().await
        }

        fn name(&self) -> &str {
            "stalled"
        }
    }

    fn bonk() -> Instrument {
        Instrument::new("BONK", "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263", 5)
    }

    #[tokio::test]
    async fn test_first_valid_price_wins() {
        let failing = StubOracle::new("down", || Err(BotError::Parse("boom".to_string())));
        let empty = StubOracle::new("empty", || Ok(None));
        let good = StubOracle::new("good", || Ok(Some(0.04)));
        let unused = StubOracle::new("unused", || Ok(Some(99.0)));

        let oracle = FallbackOracle::new(vec![
            failing.clone(),
            empty.clone(),
            good.clone(),
            unused.clone(),
        ]);

        assert_eq!(oracle.get_price(&bonk()).await.unwrap(), Some(0.04));
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(good.calls.load(Ordering::SeqCst), 1);
        assert_eq!(unused.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_price_falls_through() {
        let zero = StubOracle::new("zero", || Ok(Some(0.0)));
        let good = StubOracle::new("good", || Ok(Some(1.5)));

        let oracle = FallbackOracle::new(vec![zero, good]);
        assert_eq!(oracle.get_price(&bonk()).await.unwrap(), Some(1.5));
    }

    #[tokio::test]
    async fn test_all_failed_is_feed_unavailable() {
        let a = StubOracle::new("a", || Err(BotError::Parse("timeout".to_string())));
        let b = StubOracle::new("b", || Err(BotError::Parse("503".to_string())));

        let oracle = FallbackOracle::new(vec![a, b]);
        let err = oracle.get_price(&bonk()).await.unwrap_err();

        assert!(matches!(err, BotError::FeedUnavailable { .. }));
        assert!(err.to_string().contains("a: parse error: timeout"));
        assert!(err.to_string().contains("b: parse error: 503"));
    }

    #[tokio::test]
    async fn test_no_data_is_none() {
        let a = StubOracle::new("a", || Err(BotError::Parse("timeout".to_string())));
        let b = StubOracle::new("b", || Ok(None));

        let oracle = FallbackOracle::new(vec![a, b]);
        assert_eq!(oracle.get_price(&bonk()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_stalled_source_falls_through_to_next() {
        let good = StubOracle::new("good", || Ok(Some(0.04)));
        let oracle = FallbackOracle::new(vec![Arc::new(StalledOracle), good.clone()])
            .with_source_timeout(Duration::from_millis(20));

        let price = tokio::time::timeout(Duration::from_secs(1), oracle.get_price(&bonk()))
            .await
            .expect("fallback waited on the stalled source");

        assert_eq!(price.unwrap(), Some(0.04));
        assert_eq!(good.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_every_source_stalled_is_feed_unavailable() {
        let oracle = FallbackOracle::new(vec![Arc::new(StalledOracle), Arc::new(StalledOracle)])
            .with_source_timeout(Duration::from_millis(10));

        let err = oracle.get_price(&bonk()).await.unwrap_err();
        assert!(matches!(err, BotError::FeedUnavailable { .. }));
        assert!(err.to_string().contains("stalled: price feed unavailable for BONK: timed out"));
    }

    #[test]
    fn test_from_config_order() {
        let config = EngineConfig {
            price_sources: vec![PriceSource::DexScreener, PriceSource::Jupiter],
            ..EngineConfig::default()
        };
        let oracle = FallbackOracle::from_config(&config).unwrap();
        assert_eq!(oracle.source_names(), vec!["dexscreener", "jupiter"]);
    }

    #[test]
    fn test_from_config_splits_price_timeout() {
        let config = EngineConfig {
            price_timeout_secs: 10,
            price_sources: vec![PriceSource::Jupiter, PriceSource::DexScreener],
            ..EngineConfig::default()
        };
        let oracle = FallbackOracle::from_config(&config).unwrap();
        assert_eq!(oracle.source_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_from_config_coingecko_without_key() {
        let config = EngineConfig {
            price_sources: vec![PriceSource::CoinGecko],
            ..EngineConfig::default()
        };
        assert!(FallbackOracle::from_config(&config).is_err());
    }
}
