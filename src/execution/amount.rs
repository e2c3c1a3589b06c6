use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use crate::{BotError, Result};

/// Convert a UI amount (e.g. 0.1 SOL) to raw units (lamports)
///
/// Rejects negative, non-finite, overflowing, and dust amounts that round to zero.
pub fn to_raw_amount(ui_amount: f64, decimals: u8) -> Result<u64> {
    if decimals > 18 {
        return Err(BotError::Parse(format!("unsupported decimals: {}", decimals)));
    }

    let ui = Decimal::from_f64(ui_amount)
        .ok_or_else(|| BotError::Parse(format!("amount {} is not representable", ui_amount)))?;
    if ui < Decimal::ZERO {
        return Err(BotError::Parse(format!("amount cannot be negative: {}", ui)));
    }

    let raw = ui
        .checked_mul(Decimal::from(10u64.pow(decimals as u32)))
        .and_then(|r| r.trunc().to_u64())
        .ok_or_else(|| {
            BotError::Parse(format!(
                "amount {} with {} decimals overflows u64",
                ui, decimals
            ))
        })?;

    if raw == 0 && ui > Decimal::ZERO {
        return Err(BotError::Parse(format!(
            "amount {} too small for {} decimals (rounds to 0)",
            ui, decimals
        )));
    }

    Ok(raw)
}

/// Convert raw units back to a UI amount
pub fn from_raw_amount(raw_amount: u64, decimals: u8) -> f64 {
    let divisor = Decimal::from(10u64.pow(decimals.min(18) as u32));
    (Decimal::from(raw_amount) / divisor).to_f64().unwrap_or(0.0)
}
