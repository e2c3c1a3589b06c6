use thiserror::Error;

use crate::models::Side;

/// Errors raised by the trading core and its collaborators
#[derive(Debug, Error)]
pub enum BotError {
    /// Price feed failed, timed out, or returned nothing
    #[error("price feed unavailable for {instrument}: {reason}")]
    FeedUnavailable { instrument: String, reason: String },

    /// Price was received but is not a positive finite number
    #[error("invalid price {price} for {instrument}")]
    InvalidPrice { instrument: String, price: f64 },

    /// Venue rejected the order, timed out, or filled nothing
    #[error("{side:?} execution failed for {instrument}: {reason}")]
    ExecutionFailure {
        instrument: String,
        side: Side,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Another order for the same instrument is still outstanding
    #[error("submission rejected for {instrument}: an order is already in flight")]
    ConcurrentSubmissionRejected { instrument: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BotError {
    /// Only configuration problems stop the bot; everything else is retried next tick
    pub fn is_fatal(&self) -> bool {
        matches!(self, BotError::ConfigInvalid(_))
    }

    pub fn feed_unavailable(instrument: &str, reason: impl ToString) -> Self {
        BotError::FeedUnavailable {
            instrument: instrument.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn execution_failure(instrument: &str, side: Side, reason: impl ToString) -> Self {
        BotError::ExecutionFailure {
            instrument: instrument.to_string(),
            side,
            reason: reason.to_string(),
        }
    }
}

impl From<std::num::ParseFloatError> for BotError {
    fn from(e: std::num::ParseFloatError) -> Self {
        BotError::Parse(e.to_string())
    }
}

impl From<std::num::ParseIntError> for BotError {
    fn from(e: std::num::ParseIntError) -> Self {
        BotError::Parse(e.to_string())
    }
}

impl From<config::ConfigError> for BotError {
    fn from(e: config::ConfigError) -> Self {
        BotError::ConfigInvalid(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
