use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::time::timeout;

use super::executor::{SwapExecutor, SwapOrder};
use super::journal::{TickRecord, TickResult, TickSink};
use super::price_feed::PriceOracle;
use crate::config::{EngineTimings, StrategyConfig};
use crate::models::{Action, ExitReason, FillResult, Instrument, PositionState, Side};
use crate::strategy::decide;
use crate::{BotError, Result};

/// Result of a single tick, as returned to the caller
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub observed_price: Option<f64>,
    pub action: Action,
    pub result: TickResult,
    pub exit_reason: Option<ExitReason>,
    pub state_after: PositionState,
}

impl TickOutcome {
    pub fn is_filled(&self) -> bool {
        matches!(self.result, TickResult::Filled(_))
    }
}

/// Releases the in-flight flag when dropped, including when a tick is cancelled
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn try_claim(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Drives the position for one instrument
///
/// Local state changes only on a confirmed nonzero fill, and at most one
/// order is outstanding at any time.
pub struct PositionEngine {
    instrument: Instrument,
    strategy: StrategyConfig,
    timings: EngineTimings,
    oracle: Arc<dyn PriceOracle>,
    executor: Arc<dyn SwapExecutor>,
    sink: Arc<dyn TickSink>,
    state: Mutex<PositionState>,
    in_flight: AtomicBool,
}

impl PositionEngine {
    pub fn new(
        instrument: Instrument,
        strategy: StrategyConfig,
        timings: EngineTimings,
        oracle: Arc<dyn PriceOracle>,
        executor: Arc<dyn SwapExecutor>,
        sink: Arc<dyn TickSink>,
    ) -> Self {
        Self {
            instrument,
            strategy,
            timings,
            oracle,
            executor,
            sink,
            state: Mutex::new(PositionState::flat()),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Start from an existing position instead of flat
    pub fn with_state(self, state: PositionState) -> Self {
        *self.lock_state() = state;
        self
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    /// Snapshot of the current position
    pub fn state(&self) -> PositionState {
        self.lock_state().clone()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn lock_state(&self) -> MutexGuard<'_, PositionState> {
        // PositionState is replaced wholesale, so a poisoned value is still consistent
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// One poll: price, decision, and at most one order
    ///
    /// Never fails; every error is folded into the returned outcome and the
    /// tick record.
    pub async fn tick(&self) -> TickOutcome {
        let price = match self.fetch_price().await {
            Ok(price) => price,
            Err(e) => {
                let result = TickResult::FeedUnavailable(e.to_string());
                return self.finish(None, Action::Hold, result, None).await;
            }
        };

        let snapshot = self.state();
        self.act(price, &snapshot).await
    }

    /// Act on `price` given the position as it was read at `snapshot`
    async fn act(&self, price: f64, snapshot: &PositionState) -> TickOutcome {
        let tentative = decide(snapshot, Some(price), &self.strategy);
        if tentative.action.is_hold() {
            return self.hold(price).await;
        }

        let guard = match InFlightGuard::try_claim(&self.in_flight) {
            Some(guard) => guard,
            None => {
                let rejected = BotError::ConcurrentSubmissionRejected {
                    instrument: self.instrument.symbol.clone(),
                };
                tracing::warn!(instrument = %self.instrument, "{}", rejected);
                return self
                    .finish(Some(price), tentative.action, TickResult::SkippedInFlight, None)
                    .await;
            }
        };

        // Decide again on the state as of the claim; another tick's fill may
        // have landed after `snapshot` was read
        let decision = decide(&self.state(), Some(price), &self.strategy);
        let (side, amount) = match decision.action {
            Action::Hold => {
                drop(guard);
                return self.hold(price).await;
            }
            Action::Buy { amount } => (Side::Buy, amount),
            Action::Sell { amount } => (Side::Sell, amount),
        };

        if let Some(reason) = decision.exit_reason {
            tracing::info!(
                instrument = %self.instrument,
                price,
                reason = ?reason,
                "🔔 Exit triggered"
            );
        } else {
            tracing::info!(
                instrument = %self.instrument,
                price,
                trigger = self.strategy.buy_trigger_price,
                "🎯 Buy trigger hit"
            );
        }

        let order = SwapOrder::new(self.instrument.clone(), side, amount, price);
        let result = match self.submit(&order).await {
            Ok(fill) => {
                self.apply_fill(side, &fill);
                TickResult::Filled(fill)
            }
            Err(e) => {
                tracing::error!(
                    instrument = %self.instrument,
                    order_id = %order.id,
                    "Order failed, position unchanged: {}",
                    e
                );
                TickResult::ExecutionFailed(e.to_string())
            }
        };
        drop(guard);

        self.finish(Some(price), decision.action, result, decision.exit_reason)
            .await
    }

    async fn hold(&self, price: f64) -> TickOutcome {
        {
            let mut state = self.lock_state();
            *state = state.observe(price, &self.strategy);
        }
        self.finish(Some(price), Action::Hold, TickResult::NoAction, None)
            .await
    }

    /// Tick until `stop` turns true or its sender is dropped
    ///
    /// The stop signal is checked during the tick and during the wait, so a
    /// stalled call never holds the loop past the signal.
    pub async fn run(&self, mut stop: watch::Receiver<bool>) {
        tracing::info!(
            instrument = %self.instrument,
            mint = %self.instrument.mint,
            poll_ms = self.timings.poll_interval.as_millis() as u64,
            "👀 Monitoring started"
        );

        loop {
            tokio::select! {
                biased;
                _ = stop_requested(&mut stop) => break,
                _ = self.tick() => {}
            }

            tokio::select! {
                biased;
                _ = stop_requested(&mut stop) => break,
                _ = tokio::time::sleep(self.timings.poll_interval) => {}
            }
        }

        tracing::info!(
            instrument = %self.instrument,
            phase = ?self.state().phase(),
            "🛑 Monitoring stopped"
        );
    }

    async fn fetch_price(&self) -> Result<f64> {
        let symbol = &self.instrument.symbol;

        let price = timeout(self.timings.price_timeout, self.oracle.get_price(&self.instrument))
            .await
            .map_err(|_| {
                BotError::feed_unavailable(
                    symbol,
                    format!(
                        "{} timed out after {:?}",
                        self.oracle.name(),
                        self.timings.price_timeout
                    ),
                )
            })??
            .ok_or_else(|| BotError::feed_unavailable(symbol, "no data"))?;

        if !(price.is_finite() && price > 0.0) {
            let invalid = BotError::InvalidPrice {
                instrument: symbol.clone(),
                price,
            };
            return Err(BotError::feed_unavailable(symbol, invalid));
        }

        Ok(price)
    }

    async fn submit(&self, order: &SwapOrder) -> Result<FillResult> {
        let symbol = &self.instrument.symbol;

        let fill = timeout(self.timings.execution_timeout, self.executor.submit(order))
            .await
            .map_err(|_| {
                BotError::execution_failure(
                    symbol,
                    order.side,
                    format!(
                        "{} timed out after {:?}",
                        self.executor.name(),
                        self.timings.execution_timeout
                    ),
                )
            })??;

        if !(fill.filled_amount.is_finite() && fill.filled_amount > 0.0) {
            return Err(BotError::execution_failure(symbol, order.side, "zero fill"));
        }
        if order.side == Side::Buy && !(fill.fill_price.is_finite() && fill.fill_price > 0.0) {
            return Err(BotError::execution_failure(
                symbol,
                order.side,
                format!("fill reported unusable price {}", fill.fill_price),
            ));
        }

        Ok(fill)
    }

    fn apply_fill(&self, side: Side, fill: &FillResult) {
        let next = match side {
            Side::Buy => PositionState::long(fill.fill_price, &self.strategy),
            Side::Sell => PositionState::flat(),
        };

        *self.lock_state() = next;
    }

    async fn finish(
        &self,
        observed_price: Option<f64>,
        action: Action,
        result: TickResult,
        exit_reason: Option<ExitReason>,
    ) -> TickOutcome {
        let state_after = self.state();

        let record = TickRecord {
            timestamp: Utc::now(),
            instrument: self.instrument.symbol.clone(),
            observed_price,
            action,
            result: result.clone(),
            phase_after: state_after.phase(),
        };
        self.sink.record(&record).await;

        TickOutcome {
            observed_price,
            action,
            result,
            exit_reason,
            state_after,
        }
    }
}

async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    // Err means the sender is gone, which also stops the loop
    let _ = stop.wait_for(|stopped| *stopped).await;
}
