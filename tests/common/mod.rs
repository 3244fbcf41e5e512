//! Common test utilities and fixtures

#![allow(dead_code)]

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use webhook_trader::common::errors::{Result, TradeError};
use webhook_trader::common::traits::{ExchangeGateway, Notifier};
use webhook_trader::common::types::{MarginSnapshot, MarketOrder, OrderReceipt, Side};
use webhook_trader::NotificationDispatcher;

/// Gateway call kinds recorded in the journal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Ticker,
    Position,
    Margin,
    Order,
}

#[derive(Default)]
struct FakeState {
    prices: HashMap<String, Decimal>,
    positions: HashMap<String, Decimal>,
    free_margin: Decimal,
    orders: Vec<MarketOrder>,
    journal: Vec<(String, Call)>,
    reject_entries: bool,
}

/// In-memory futures account
///
/// Orders move the simulated position immediately. Every call is journaled
/// and can be slowed down so overlapping runs would interleave.
#[derive(Default)]
pub struct FakeGateway {
    state: Mutex<FakeState>,
    call_delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(self, symbol: &str, price: Decimal) -> Self {
        self.state.lock().unwrap().prices.insert(symbol.to_string(), price);
        self
    }

    pub fn with_position(self, symbol: &str, amount: Decimal) -> Self {
        self.state
            .lock()
            .unwrap()
            .positions
            .insert(symbol.to_string(), amount);
        self
    }

    pub fn with_free_margin(self, free: Decimal) -> Self {
        self.state.lock().unwrap().free_margin = free;
        self
    }

    pub fn with_call_delay(mut self, delay: Duration) -> Self {
        self.call_delay = delay;
        self
    }

    pub fn rejecting_entries(self) -> Self {
        self.state.lock().unwrap().reject_entries = true;
        self
    }

    pub fn orders(&self) -> Vec<MarketOrder> {
        self.state.lock().unwrap().orders.clone()
    }

    pub fn position(&self, symbol: &str) -> Decimal {
        self.state
            .lock()
            .unwrap()
            .positions
            .get(symbol)
            .copied()
            .unwrap_or_default()
    }

    pub fn journal(&self) -> Vec<(String, Call)> {
        self.state.lock().unwrap().journal.clone()
    }

    /// Highest number of gateway calls observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn record(&self, symbol: &str, call: Call) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.call_delay.is_zero() {
            tokio::time::sleep(self.call_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.state
            .lock()
            .unwrap()
            .journal
            .push((symbol.to_string(), call));
    }
}

#[async_trait]
impl ExchangeGateway for FakeGateway {
    async fn fetch_ticker(&self, symbol: &str) -> Result<Decimal> {
        self.record(symbol, Call::Ticker).await;
        self.state
            .lock()
            .unwrap()
            .prices
            .get(symbol)
            .copied()
            .ok_or_else(|| TradeError::InvalidResponse(format!("no ticker for {}", symbol)))
    }

    async fn fetch_position(&self, symbol: &str) -> Result<Decimal> {
        self.record(symbol, Call::Position).await;
        Ok(self.position(symbol))
    }

    async fn fetch_available_margin(&self) -> Result<MarginSnapshot> {
        self.record("*", Call::Margin).await;
        let free = self.state.lock().unwrap().free_margin;
        Ok(MarginSnapshot::new(free, Decimal::ZERO, free))
    }

    async fn submit_market_order(&self, order: &MarketOrder) -> Result<OrderReceipt> {
        self.record(&order.symbol, Call::Order).await;

        let mut state = self.state.lock().unwrap();
        if state.reject_entries && !order.reduce_only {
            return Err(TradeError::ExchangeRejected {
                code: -2019,
                message: "Margin is insufficient.".to_string(),
            });
        }

        let signed = match order.side {
            Side::Buy => order.quantity,
            Side::Sell => -order.quantity,
        };
        *state.positions.entry(order.symbol.clone()).or_default() += signed;
        state.orders.push(order.clone());
        let fill = state.prices.get(&order.symbol).copied();

        Ok(OrderReceipt {
            order_id: state.orders.len().to_string(),
            symbol: order.symbol.clone(),
            side: order.side,
            quantity: order.quantity,
            average_price: fill,
            status: "FILLED".to_string(),
            timestamp: chrono::Utc::now(),
        })
    }

    fn venue_name(&self) -> &'static str {
        "fake"
    }
}

/// Notifier that keeps every delivered message
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        self.messages.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

/// Spawn a dispatcher that feeds a fresh [`RecordingNotifier`]
pub fn recording_dispatcher() -> (NotificationDispatcher, Arc<RecordingNotifier>) {
    let recorder = Arc::new(RecordingNotifier::default());
    let (dispatcher, _task) = NotificationDispatcher::spawn(recorder.clone(), 64);
    (dispatcher, recorder)
}

/// Sample exchange payloads for adapter tests
pub mod rest_bodies {
    pub const TICKER: &str = r#"{"symbol":"BTCUSDT","price":"64010.46","time":1704067200000}"#;

    pub const POSITION_RISK_ONE_WAY: &str = r#"[
        {
            "symbol": "BTCUSDT",
            "positionAmt": "-0.250",
            "entryPrice": "64100.0",
            "markPrice": "64010.46",
            "unRealizedProfit": "22.38",
            "leverage": "5",
            "positionSide": "BOTH"
        }
    ]"#;

    pub const BALANCE: &str = r#"[
        {"asset": "BNB", "balance": "0.10", "availableBalance": "0.10"},
        {"asset": "USDT", "balance": "1250.50", "availableBalance": "1000.25"}
    ]"#;

    pub const ORDER_FILLED: &str = r#"{
        "orderId": 283194212,
        "symbol": "BTCUSDT",
        "status": "FILLED",
        "side": "SELL",
        "origQty": "0.250",
        "executedQty": "0.250",
        "avgPrice": "64008.10",
        "updateTime": 1704067201000
    }"#;

    pub const LEVERAGE: &str = r#"{"leverage":5,"maxNotionalValue":"1000000","symbol":"BTCUSDT"}"#;

    pub const REJECTED: &str = r#"{"code":-2019,"msg":"Margin is insufficient."}"#;
}
