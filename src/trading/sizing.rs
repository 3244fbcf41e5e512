use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// Sizing failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SizingError {
    /// Price was zero or negative, so no quantity can be derived
    #[error("invalid price for sizing: {0}")]
    InvalidPrice(Decimal),

    /// The intermediate notional does not fit in a Decimal
    #[error("order notional overflowed")]
    Overflow,
}

/// Order quantity from free margin
///
/// `free_margin * safety_factor * leverage / price`. A non-positive margin
/// sizes to zero; a non-positive price is an error rather than a numeric
/// fault.
pub fn order_size(
    free_margin: Decimal,
    leverage: u32,
    price: Decimal,
    safety_factor: Decimal,
) -> Result<Decimal, SizingError> {
    if price <= Decimal::ZERO {
        return Err(SizingError::InvalidPrice(price));
    }
    if free_margin <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }

    let notional = free_margin
        .checked_mul(safety_factor)
        .and_then(|v| v.checked_mul(Decimal::from(leverage)))
        .ok_or(SizingError::Overflow)?;

    notional.checked_div(price).ok_or(SizingError::Overflow)
}

/// Sizing parameters applied to every entry order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingPolicy {
    pub leverage: u32,
    pub safety_factor: Decimal,
    /// Decimal places the exchange accepts for quantities
    pub quantity_precision: Option<u32>,
}

impl SizingPolicy {
    pub fn new(leverage: u32, safety_factor: Decimal) -> Self {
        Self {
            leverage,
            safety_factor,
            quantity_precision: None,
        }
    }

    pub fn with_quantity_precision(mut self, precision: Option<u32>) -> Self {
        self.quantity_precision = precision;
        self
    }

    /// Quantity for an entry at `price`, truncated to the lot precision
    ///
    /// Truncation rounds toward zero so the order never exceeds the margin
    /// it was sized from.
    pub fn quantity(&self, free_margin: Decimal, price: Decimal) -> Result<Decimal, SizingError> {
        let raw = order_size(free_margin, self.leverage, price, self.safety_factor)?;
        Ok(match self.quantity_precision {
            Some(dp) => raw.round_dp_with_strategy(dp, RoundingStrategy::ToZero),
            None => raw,
        })
    }
}
