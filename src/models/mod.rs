use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::StrategyConfig;

/// A tradable token identified by its mint / contract address
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instrument {
    pub symbol: String,
    pub mint: String, // Solana mint or EVM contract address
    pub decimals: u8,
}

impl Instrument {
    pub fn new(symbol: impl Into<String>, mint: impl Into<String>, decimals: u8) -> Self {
        Self {
            symbol: symbol.into(),
            mint: mint.into(),
            decimals,
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

/// What the strategy wants done on this tick
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Action {
    Hold,
    Buy { amount: f64 },
    Sell { amount: f64 },
}

impl Action {
    pub fn side(&self) -> Option<Side> {
        match self {
            Action::Hold => None,
            Action::Buy { .. } => Some(Side::Buy),
            Action::Sell { .. } => Some(Side::Sell),
        }
    }

    pub fn amount(&self) -> Option<f64> {
        match self {
            Action::Hold => None,
            Action::Buy { amount } | Action::Sell { amount } => Some(*amount),
        }
    }

    pub fn is_hold(&self) -> bool {
        matches!(self, Action::Hold)
    }
}

/// Confirmed execution reported by the venue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FillResult {
    pub filled_amount: f64,
    pub fill_price: f64,
    pub signature: Option<String>, // Transaction signature when broadcast
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PositionPhase {
    Flat,
    Long,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    TrailingStop,
    TakeProfit,
    ProfitTarget,
}

/// Position for a single instrument.
///
/// Entry and peak are set iff the phase is `Long`, and the peak never drops
/// below the entry. Stop-loss and take-profit levels are derived from them and
/// recomputed on every change, so callers never set them directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PositionState {
    phase: PositionPhase,
    entry_price: Option<f64>,
    peak_price: Option<f64>,
    stop_loss_price: Option<f64>,
    take_profit_price: Option<f64>,
}

impl PositionState {
    pub fn flat() -> Self {
        Self {
            phase: PositionPhase::Flat,
            entry_price: None,
            peak_price: None,
            stop_loss_price: None,
            take_profit_price: None,
        }
    }

    /// Fresh long position right after a buy fill
    pub fn long(entry_price: f64, config: &StrategyConfig) -> Self {
        Self::long_with_peak(entry_price, entry_price, config)
    }

    /// Long position that has already seen `peak_price` (clamped to at least the entry)
    pub fn long_with_peak(entry_price: f64, peak_price: f64, config: &StrategyConfig) -> Self {
        let peak = peak_price.max(entry_price);
        let (stop_loss_price, take_profit_price) = thresholds(entry_price, peak, config);

        Self {
            phase: PositionPhase::Long,
            entry_price: Some(entry_price),
            peak_price: Some(peak),
            stop_loss_price,
            take_profit_price,
        }
    }

    /// State after observing `price`: raises the peak (and the trailing stop
    /// with it) while long, otherwise unchanged
    pub fn observe(&self, price: f64, config: &StrategyConfig) -> Self {
        match (self.phase, self.entry_price, self.peak_price) {
            (PositionPhase::Long, Some(entry), Some(peak)) => {
                Self::long_with_peak(entry, peak.max(price), config)
            }
            _ => self.clone(),
        }
    }

    pub fn phase(&self) -> PositionPhase {
        self.phase
    }

    pub fn is_long(&self) -> bool {
        self.phase == PositionPhase::Long
    }

    pub fn entry_price(&self) -> Option<f64> {
        self.entry_price
    }

    pub fn peak_price(&self) -> Option<f64> {
        self.peak_price
    }

    pub fn stop_loss_price(&self) -> Option<f64> {
        self.stop_loss_price
    }

    pub fn take_profit_price(&self) -> Option<f64> {
        self.take_profit_price
    }
}

impl Default for PositionState {
    fn default() -> Self {
        Self::flat()
    }
}

/// Derive (stop-loss, take-profit) from entry and peak.
///
/// With both a fixed and a trailing stop configured the higher of the two wins.
fn thresholds(entry: f64, peak: f64, config: &StrategyConfig) -> (Option<f64>, Option<f64>) {
    let fixed_stop = config.stop_loss_fraction.map(|f| entry * (1.0 - f));
    let trailing_stop = config.trailing_stop_fraction.map(|f| peak * (1.0 - f));

    let stop_loss = match (fixed_stop, trailing_stop) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };
    let take_profit = config.take_profit_fraction.map(|f| entry * (1.0 + f));

    (stop_loss, take_profit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("expected a price");
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    fn config() -> StrategyConfig {
        StrategyConfig {
            stop_loss_fraction: Some(0.2),
            trailing_stop_fraction: Some(0.15),
            take_profit_fraction: Some(1.0),
            ..StrategyConfig::default()
        }
    }

    #[test]
    fn test_flat_has_no_prices() {
        let state = PositionState::flat();
        assert_eq!(state.phase(), PositionPhase::Flat);
        assert_eq!(state.entry_price(), None);
        assert_eq!(state.peak_price(), None);
        assert_eq!(state.stop_loss_price(), None);
        assert_eq!(state.take_profit_price(), None);
    }

    #[test]
    fn test_long_derives_thresholds() {
        let state = PositionState::long(100.0, &config());

        assert!(state.is_long());
        assert_eq!(state.entry_price(), Some(100.0));
        assert_eq!(state.peak_price(), Some(100.0));
        // Trailing stop (85) sits above the fixed stop (80)
        assert_close(state.stop_loss_price(), 85.0);
        assert_close(state.take_profit_price(), 200.0);
    }

    #[test]
    fn test_fixed_stop_only() {
        let cfg = StrategyConfig {
            stop_loss_fraction: Some(0.2),
            trailing_stop_fraction: None,
            ..StrategyConfig::default()
        };
        let state = PositionState::long(100.0, &cfg).observe(150.0, &cfg);

        assert_eq!(state.peak_price(), Some(150.0));
        assert_close(state.stop_loss_price(), 80.0);
    }

    #[test]
    fn test_peak_clamped_to_entry() {
        let state = PositionState::long_with_peak(100.0, 90.0, &config());
        assert_eq!(state.peak_price(), Some(100.0));
    }

    #[test]
    fn test_observe_raises_peak_never_lowers() {
        let cfg = config();
        let state = PositionState::long(100.0, &cfg);

        let higher = state.observe(120.0, &cfg);
        assert_eq!(higher.peak_price(), Some(120.0));
        assert_close(higher.stop_loss_price(), 102.0);

        let lower = higher.observe(110.0, &cfg);
        assert_eq!(lower.peak_price(), Some(120.0));
        assert_close(lower.stop_loss_price(), 102.0);
    }

    #[test]
    fn test_observe_flat_is_noop() {
        let state = PositionState::flat();
        assert_eq!(state.observe(5.0, &config()), state);
    }

    #[test]
    fn test_action_accessors() {
        assert_eq!(Action::Hold.side(), None);
        assert_eq!(Action::Buy { amount: 0.1 }.side(), Some(Side::Buy));
        assert_eq!(Action::Sell { amount: 10.0 }.amount(), Some(10.0));
        assert!(Action::Hold.is_hold());
    }
}
