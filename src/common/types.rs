//! Unified types shared by the webhook, the trading core and the exchange gateway

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Signal action sent by the alert source
///
/// Variant order is the debounce priority: `Buy` beats `Sell` beats `Flat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Flat,
}

impl Action {
    /// Side of the entry order for a directional action
    pub fn entry_side(&self) -> Option<Side> {
        match self {
            Action::Buy => Some(Side::Buy),
            Action::Sell => Some(Side::Sell),
            Action::Flat => None,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
            Action::Flat => write!(f, "FLAT"),
        }
    }
}

/// Error returned when an action literal is not BUY, SELL or FLAT
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Ok(Action::Buy),
            "SELL" => Ok(Action::Sell),
            "FLAT" => Ok(Action::Flat),
            _ => Err(UnknownAction(s.to_string())),
        }
    }
}

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Side whose market order reduces a position of the given signed size
    pub fn closing(position_size: Decimal) -> Option<Side> {
        if position_size > Decimal::ZERO {
            Some(Side::Sell)
        } else if position_size < Decimal::ZERO {
            Some(Side::Buy)
        } else {
            None
        }
    }

    /// Whether a position of the given signed size points the other way
    pub fn opposes(&self, position_size: Decimal) -> bool {
        match self {
            Side::Buy => position_size < Decimal::ZERO,
            Side::Sell => position_size > Decimal::ZERO,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// A single inbound trade signal, already authenticated and validated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub action: Action,
    pub received_at: DateTime<Utc>,
}

impl Signal {
    pub fn new(symbol: impl Into<String>, action: Action) -> Self {
        Self {
            symbol: symbol.into(),
            action,
            received_at: Utc::now(),
        }
    }
}

/// Margin balances in quote currency
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MarginSnapshot {
    /// Usable for new positions
    pub free: Decimal,
    /// Locked as collateral by open positions and orders
    pub held: Decimal,
    pub total: Decimal,
}

impl MarginSnapshot {
    pub fn new(free: Decimal, held: Decimal, total: Decimal) -> Self {
        Self { free, held, total }
    }
}

/// Market order request handed to the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOrder {
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    /// Only allowed to shrink an existing position
    pub reduce_only: bool,
    pub leverage: u32,
}

impl MarketOrder {
    pub fn entry(symbol: impl Into<String>, side: Side, quantity: Decimal, leverage: u32) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            reduce_only: false,
            leverage,
        }
    }

    pub fn close(symbol: impl Into<String>, side: Side, quantity: Decimal, leverage: u32) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            reduce_only: true,
            leverage,
        }
    }
}

/// Exchange acknowledgement for a submitted order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub order_id: String,
    pub symbol: String,
    pub side: Side,
    /// Executed quantity as reported by the exchange
    pub quantity: Decimal,
    /// Average fill price, if the exchange reported one
    pub average_price: Option<Decimal>,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}
