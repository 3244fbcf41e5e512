//! Trait definitions for the executor's external collaborators

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::errors::Result;
use super::types::{MarginSnapshot, MarketOrder, OrderReceipt};

/// Connectivity to the derivatives exchange
///
/// Every call is a fresh request/response. Implementations own their
/// per-call timeouts; callers treat any error as recoverable.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Last traded price for a symbol
    async fn fetch_ticker(&self, symbol: &str) -> Result<Decimal>;

    /// Signed position size (positive = long, negative = short, zero = flat)
    async fn fetch_position(&self, symbol: &str) -> Result<Decimal>;

    /// Current margin balances for the trading account
    async fn fetch_available_margin(&self) -> Result<MarginSnapshot>;

    /// Submit an immediate market order
    async fn submit_market_order(&self, order: &MarketOrder) -> Result<OrderReceipt>;

    /// Name of the venue, used in logs
    fn venue_name(&self) -> &'static str;
}

/// Outbound chat sink for human-readable trade notifications
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a message
    async fn send(&self, message: &str) -> Result<()>;
}
