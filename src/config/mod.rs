use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{BotError, Result};
use crate::models::{Instrument, PositionState};

/// Wrapped SOL mint, the default quote asset for swaps
pub const WRAPPED_SOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// Entry/exit rules for one instrument
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategyConfig {
    /// Buy when price is at or below this level
    pub buy_trigger_price: f64,
    /// Sell when price >= entry * profit_multiplier
    #[serde(default = "default_profit_multiplier")]
    pub profit_multiplier: f64,
    /// Fixed stop at entry * (1 - fraction)
    #[serde(default)]
    pub stop_loss_fraction: Option<f64>,
    /// Trailing stop at peak * (1 - fraction)
    #[serde(default)]
    pub trailing_stop_fraction: Option<f64>,
    /// Take-profit at entry * (1 + fraction)
    #[serde(default)]
    pub take_profit_fraction: Option<f64>,
    /// Quote-asset amount spent per buy (e.g. SOL)
    #[serde(default = "default_buy_size_base")]
    pub buy_size_base: f64,
    /// Token amount sold per exit
    #[serde(default = "default_sell_size_base")]
    pub sell_size_base: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            buy_trigger_price: 0.05,
            profit_multiplier: default_profit_multiplier(),
            stop_loss_fraction: None,
            trailing_stop_fraction: None,
            take_profit_fraction: None,
            buy_size_base: default_buy_size_base(),
            sell_size_base: default_sell_size_base(),
        }
    }
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<()> {
        positive_finite("buy_trigger_price", self.buy_trigger_price)?;
        positive_finite("buy_size_base", self.buy_size_base)?;
        positive_finite("sell_size_base", self.sell_size_base)?;

        if !self.profit_multiplier.is_finite() || self.profit_multiplier <= 1.0 {
            return Err(BotError::ConfigInvalid(format!(
                "profit_multiplier must be greater than 1, got {}",
                self.profit_multiplier
            )));
        }

        if let Some(f) = self.stop_loss_fraction {
            unit_fraction("stop_loss_fraction", f)?;
        }
        if let Some(f) = self.trailing_stop_fraction {
            unit_fraction("trailing_stop_fraction", f)?;
        }
        if let Some(f) = self.take_profit_fraction {
            positive_finite("take_profit_fraction", f)?;
        }

        // Stop must sit below take-profit for a fresh position
        let probe = PositionState::long(1.0, self);
        if let (Some(stop), Some(take_profit)) =
            (probe.stop_loss_price(), probe.take_profit_price())
        {
            if stop >= take_profit {
                return Err(BotError::ConfigInvalid(format!(
                    "stop-loss level ({:.4}x entry) must be below take-profit ({:.4}x entry)",
                    stop, take_profit
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    Jupiter,
    DexScreener,
    CoinGecko,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Simulated fills at the observed price
    #[default]
    Paper,
    /// Fills taken from live Jupiter quotes, never broadcast
    Quote,
}

/// Settings shared by every engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_price_timeout_secs")]
    pub price_timeout_secs: u64,
    #[serde(default = "default_execution_timeout_secs")]
    pub execution_timeout_secs: u64,
    /// Tried in order; first valid price wins
    #[serde(default = "default_price_sources")]
    pub price_sources: Vec<PriceSource>,
    #[serde(default)]
    pub execution_mode: ExecutionMode,
    #[serde(default = "default_quote_mint")]
    pub quote_mint: String,
    #[serde(default = "default_quote_decimals")]
    pub quote_decimals: u8,
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u16,
    #[serde(default)]
    pub journal_path: Option<PathBuf>,
    #[serde(default)]
    pub coingecko_api_key: Option<String>,
    #[serde(default = "default_coingecko_platform")]
    pub coingecko_platform: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            price_timeout_secs: default_price_timeout_secs(),
            execution_timeout_secs: default_execution_timeout_secs(),
            price_sources: default_price_sources(),
            execution_mode: ExecutionMode::default(),
            quote_mint: default_quote_mint(),
            quote_decimals: default_quote_decimals(),
            slippage_bps: default_slippage_bps(),
            journal_path: None,
            coingecko_api_key: None,
            coingecko_platform: default_coingecko_platform(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(BotError::ConfigInvalid(
                "poll_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.price_timeout_secs == 0 || self.execution_timeout_secs == 0 {
            return Err(BotError::ConfigInvalid(
                "timeouts must be at least 1 second".to_string(),
            ));
        }
        if self.price_sources.is_empty() {
            return Err(BotError::ConfigInvalid(
                "at least one price source is required".to_string(),
            ));
        }
        if self.price_sources.contains(&PriceSource::CoinGecko)
            && self.coingecko_api_key.as_deref().map_or(true, str::is_empty)
        {
            return Err(BotError::ConfigInvalid(
                "coingecko price source needs coingecko_api_key".to_string(),
            ));
        }
        if self.slippage_bps > 10_000 {
            return Err(BotError::ConfigInvalid(format!(
                "slippage_bps must be at most 10000, got {}",
                self.slippage_bps
            )));
        }
        Ok(())
    }

    pub fn timings(&self) -> EngineTimings {
        EngineTimings {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            price_timeout: Duration::from_secs(self.price_timeout_secs),
            execution_timeout: Duration::from_secs(self.execution_timeout_secs),
        }
    }
}

/// Poll cadence and collaborator deadlines for a `PositionEngine`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineTimings {
    pub poll_interval: Duration,
    pub price_timeout: Duration,
    pub execution_timeout: Duration,
}

impl Default for EngineTimings {
    fn default() -> Self {
        EngineConfig::default().timings()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstrumentConfig {
    pub symbol: String,
    pub mint: String,
    #[serde(default = "default_token_decimals")]
    pub decimals: u8,
    pub strategy: StrategyConfig,
}

impl InstrumentConfig {
    pub fn instrument(&self) -> Instrument {
        Instrument::new(&self.symbol, &self.mint, self.decimals)
    }
}

/// Top-level configuration, read once at startup
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BotConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    pub instruments: Vec<InstrumentConfig>,
}

impl BotConfig {
    /// Load from an optional TOML file plus `DIPBOT__*` environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        builder = match path {
            Some(path) => builder.add_source(config::File::from(path).required(true)),
            None => builder.add_source(config::File::with_name("dipbot").required(false)),
        };

        let settings = builder
            .add_source(
                config::Environment::with_prefix("DIPBOT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: BotConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?;

        let config: BotConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;

        if self.instruments.is_empty() {
            return Err(BotError::ConfigInvalid(
                "no instruments configured".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for instrument in &self.instruments {
            if instrument.mint.trim().is_empty() {
                return Err(BotError::ConfigInvalid(format!(
                    "instrument {} has an empty mint",
                    instrument.symbol
                )));
            }
            if !seen.insert(instrument.mint.as_str()) {
                return Err(BotError::ConfigInvalid(format!(
                    "instrument {} is configured twice",
                    instrument.mint
                )));
            }
            instrument.strategy.validate().map_err(|e| match e {
                BotError::ConfigInvalid(msg) => {
                    BotError::ConfigInvalid(format!("{}: {}", instrument.symbol, msg))
                }
                other => other,
            })?;
        }

        Ok(())
    }
}

fn positive_finite(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(BotError::ConfigInvalid(format!(
            "{} must be positive, got {}",
            name, value
        )))
    }
}

fn unit_fraction(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(BotError::ConfigInvalid(format!(
            "{} must be between 0 and 1, got {}",
            name, value
        )))
    }
}

fn default_profit_multiplier() -> f64 {
    1.2
}

fn default_buy_size_base() -> f64 {
    0.1
}

fn default_sell_size_base() -> f64 {
    10.0
}

fn default_poll_interval_secs() -> u64 {
    1
}

fn default_price_timeout_secs() -> u64 {
    10
}

fn default_execution_timeout_secs() -> u64 {
    60
}

fn default_price_sources() -> Vec<PriceSource> {
    vec![PriceSource::Jupiter, PriceSource::DexScreener]
}

fn default_quote_mint() -> String {
    WRAPPED_SOL_MINT.to_string()
}

fn default_quote_decimals() -> u8 {
    9
}

fn default_slippage_bps() -> u16 {
    50
}

fn default_coingecko_platform() -> String {
    "ethereum".to_string()
}

fn default_token_decimals() -> u8 {
    9
}
