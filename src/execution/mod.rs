// Position management, order execution and price collection
pub mod amount;
pub mod executor;
pub mod journal;
pub mod position_engine;
pub mod price_feed;

pub use amount::{from_raw_amount, to_raw_amount};
pub use executor::{PaperExecutor, QuoteExecutor, SwapExecutor, SwapOrder};
pub use journal::{
    FanoutSink, JsonLinesSink, MemorySink, TickRecord, TickResult, TickSink, TracingSink,
};
pub use position_engine::{PositionEngine, TickOutcome};
pub use price_feed::{FallbackOracle, PriceOracle};
