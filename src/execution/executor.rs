use async_trait::async_trait;
use rand::Rng;
use uuid::Uuid;

use super::amount::{from_raw_amount, to_raw_amount};
use crate::api::JupiterClient;
use crate::models::{FillResult, Instrument, Side};
use crate::{BotError, Result};

/// One logical order handed to a venue
#[derive(Debug, Clone, PartialEq)]
pub struct SwapOrder {
    /// Client-side id, unique per submission
    pub id: Uuid,
    pub instrument: Instrument,
    pub side: Side,
    /// Buy: quote asset to spend. Sell: tokens to sell.
    pub amount: f64,
    /// Price observed when the order was decided
    pub observed_price: f64,
}

impl SwapOrder {
    pub fn new(instrument: Instrument, side: Side, amount: f64, observed_price: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            instrument,
            side,
            amount,
            observed_price,
        }
    }
}

/// Venue that turns orders into fills
///
/// Each call is one submission; implementations never retry, and callers
/// never call twice for the same order.
#[async_trait]
pub trait SwapExecutor: Send + Sync {
    async fn submit(&self, order: &SwapOrder) -> Result<FillResult>;

    fn name(&self) -> &str;
}

/// Simulated venue: fills at the observed price with random adverse slippage
pub struct PaperExecutor {
    max_slippage_bps: u16,
    failure_rate: f64,
}

impl PaperExecutor {
    pub fn new(max_slippage_bps: u16) -> Self {
        Self {
            max_slippage_bps,
            failure_rate: 0.0,
        }
    }

    /// Reject this fraction of orders (0.0..=1.0) to exercise failure handling
    pub fn with_failure_rate(mut self, failure_rate: f64) -> Self {
        self.failure_rate = failure_rate.clamp(0.0, 1.0);
        self
    }

    fn simulate(&self, order: &SwapOrder) -> Result<FillResult> {
        let mut rng = rand::thread_rng();

        if self.failure_rate > 0.0 && rng.gen_bool(self.failure_rate) {
            return Err(BotError::execution_failure(
                &order.instrument.symbol,
                order.side,
                "simulated venue rejection",
            ));
        }

        let max_slip = self.max_slippage_bps as f64 / 10_000.0;
        let slip = rng.gen_range(0.0..=max_slip);

        let fill_price = match order.side {
            Side::Buy => order.observed_price * (1.0 + slip),
            Side::Sell => order.observed_price * (1.0 - slip),
        };

        let filled_amount = match order.side {
            Side::Buy => order.amount / fill_price,
            Side::Sell => order.amount,
        };

        Ok(FillResult {
            filled_amount,
            fill_price,
            signature: None,
        })
    }
}

#[async_trait]
impl SwapExecutor for PaperExecutor {
    async fn submit(&self, order: &SwapOrder) -> Result<FillResult> {
        if !(order.observed_price.is_finite() && order.observed_price > 0.0) {
            return Err(BotError::execution_failure(
                &order.instrument.symbol,
                order.side,
                "no reference price for paper fill",
            ));
        }

        let fill = self.simulate(order)?;

        tracing::info!(
            order_id = %order.id,
            instrument = %order.instrument,
            side = ?order.side,
            filled = fill.filled_amount,
            price = fill.fill_price,
            "📝 Paper fill"
        );

        Ok(fill)
    }

    fn name(&self) -> &str {
        "paper"
    }
}

/// Venue backed by live Jupiter quotes; the quote is taken as the fill
///
/// Nothing is signed or broadcast. The fill price is the observed price
/// moved against us by the quoted price impact, so it stays in the same
/// denomination as the price feed.
pub struct QuoteExecutor {
    jupiter: JupiterClient,
    quote_mint: String,
    quote_decimals: u8,
    slippage_bps: u16,
}

impl QuoteExecutor {
    pub fn new(
        jupiter: JupiterClient,
        quote_mint: &str,
        quote_decimals: u8,
        slippage_bps: u16,
    ) -> Self {
        Self {
            jupiter,
            quote_mint: quote_mint.to_string(),
            quote_decimals,
            slippage_bps,
        }
    }

    fn failure(&self, order: &SwapOrder, reason: impl ToString) -> BotError {
        BotError::execution_failure(&order.instrument.symbol, order.side, reason)
    }
}

#[async_trait]
impl SwapExecutor for QuoteExecutor {
    async fn submit(&self, order: &SwapOrder) -> Result<FillResult> {
        let token = &order.instrument;

        let (input_mint, output_mint, input_decimals, output_decimals) = match order.side {
            Side::Buy => (
                self.quote_mint.as_str(),
                token.mint.as_str(),
                self.quote_decimals,
                token.decimals,
            ),
            Side::Sell => (
                token.mint.as_str(),
                self.quote_mint.as_str(),
                token.decimals,
                self.quote_decimals,
            ),
        };

        let raw_in =
            to_raw_amount(order.amount, input_decimals).map_err(|e| self.failure(order, e))?;
        if raw_in == 0 {
            return Err(self.failure(order, "order amount is zero"));
        }

        let quote = self
            .jupiter
            .get_quote(input_mint, output_mint, raw_in, self.slippage_bps)
            .await
            .map_err(|e| self.failure(order, e))?;

        if quote.out_amount == 0 {
            return Err(self.failure(order, "quote returned zero output"));
        }

        let impact = quote.price_impact_pct.max(0.0) / 100.0;
        let (filled_amount, fill_price) = match order.side {
            Side::Buy => (
                from_raw_amount(quote.out_amount, output_decimals),
                order.observed_price * (1.0 + impact),
            ),
            Side::Sell => (order.amount, order.observed_price * (1.0 - impact)),
        };

        tracing::info!(
            order_id = %order.id,
            instrument = %token,
            side = ?order.side,
            in_amount = quote.in_amount,
            out_amount = quote.out_amount,
            impact_pct = quote.price_impact_pct,
            "🔁 Quote fill"
        );

        Ok(FillResult {
            filled_amount,
            fill_price,
            signature: None,
        })
    }

    fn name(&self) -> &str {
        "jupiter-quote"
    }
}
