use crate::config::StrategyConfig;
use crate::models::{Action, ExitReason, PositionState};

/// Outcome of evaluating one price observation
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub action: Action,
    /// State to adopt once the action succeeds (immediately for `Hold`)
    pub next_state: PositionState,
    pub exit_reason: Option<ExitReason>,
}

impl Decision {
    fn hold(state: PositionState) -> Self {
        Self {
            action: Action::Hold,
            next_state: state,
            exit_reason: None,
        }
    }
}

/// Decide what to do at `price` given the current position.
///
/// Exits are checked before entries, and within exits the order is
/// stop (fixed or trailing), take-profit, then the profit multiplier.
/// A missing, non-positive or non-finite price yields `Hold` with the
/// state untouched.
///
/// For a buy the returned state assumes a fill at `price`; the engine
/// replaces the entry with the confirmed fill price.
pub fn decide(state: &PositionState, price: Option<f64>, config: &StrategyConfig) -> Decision {
    let price = match price {
        Some(p) if p.is_finite() && p > 0.0 => p,
        _ => return Decision::hold(state.clone()),
    };

    if state.is_long() {
        let observed = state.observe(price, config);

        match exit_reason(&observed, price, config) {
            Some(reason) => Decision {
                action: Action::Sell {
                    amount: config.sell_size_base,
                },
                next_state: PositionState::flat(),
                exit_reason: Some(reason),
            },
            None => Decision::hold(observed),
        }
    } else if price <= config.buy_trigger_price {
        Decision {
            action: Action::Buy {
                amount: config.buy_size_base,
            },
            next_state: PositionState::long(price, config),
            exit_reason: None,
        }
    } else {
        Decision::hold(state.clone())
    }
}

fn exit_reason(state: &PositionState, price: f64, config: &StrategyConfig) -> Option<ExitReason> {
    let entry = state.entry_price()?;

    if let Some(stop) = state.stop_loss_price() {
        if price <= stop {
            let below_fixed_stop = config
                .stop_loss_fraction
                .map_or(false, |f| price <= entry * (1.0 - f));
            return Some(if below_fixed_stop {
                ExitReason::StopLoss
            } else {
                ExitReason::TrailingStop
            });
        }
    }

    if let Some(take_profit) = state.take_profit_price() {
        if price >= take_profit {
            return Some(ExitReason::TakeProfit);
        }
    }

    if price >= entry * config.profit_multiplier {
        return Some(ExitReason::ProfitTarget);
    }

    None
}
