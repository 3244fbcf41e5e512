use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use super::debouncer::ActionHandler;
use super::lock::ExecutionLock;
use super::sizing::SizingPolicy;
use super::types::{ExecutionOutcome, ExecutionReport, FailureStage};
use crate::common::errors::TradeError;
use crate::common::traits::ExchangeGateway;
use crate::common::types::{Action, MarketOrder, Side};
use crate::config::types::TradingConfig;
use crate::notify::NotificationDispatcher;

/// Execution parameters that are not part of sizing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutorSettings {
    /// Wait after closing an opposing position before reading margin again
    pub settlement_delay: Duration,
    /// Free margin at or below this aborts an entry
    pub min_free_margin: Decimal,
}

impl ExecutorSettings {
    pub fn from_config(config: &TradingConfig) -> Self {
        Self {
            settlement_delay: config.settlement_delay(),
            min_free_margin: config.min_free_margin,
        }
    }
}

/// Reconciles the current position with the requested action
///
/// Runs are serialized through the [`ExecutionLock`]. Every run ends in
/// exactly one notification and never returns an error to its caller.
pub struct TradeExecutor {
    gateway: Arc<dyn ExchangeGateway>,
    notifier: NotificationDispatcher,
    lock: ExecutionLock,
    sizing: SizingPolicy,
    settings: ExecutorSettings,
}

impl TradeExecutor {
    pub fn new(
        gateway: Arc<dyn ExchangeGateway>,
        notifier: NotificationDispatcher,
        lock: ExecutionLock,
        sizing: SizingPolicy,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            gateway,
            notifier,
            lock,
            sizing,
            settings,
        }
    }

    /// Build an executor from the trading section of the configuration
    pub fn from_config(
        gateway: Arc<dyn ExchangeGateway>,
        notifier: NotificationDispatcher,
        lock: ExecutionLock,
        config: &TradingConfig,
    ) -> Self {
        let sizing = SizingPolicy::new(config.leverage, config.safety_factor)
            .with_quantity_precision(config.quantity_precision);
        Self::new(
            gateway,
            notifier,
            lock,
            sizing,
            ExecutorSettings::from_config(config),
        )
    }

    pub fn lock(&self) -> &ExecutionLock {
        &self.lock
    }

    /// Run one action for a symbol under the execution lock
    #[instrument(skip(self), fields(account = %self.lock.account()))]
    pub async fn execute(&self, symbol: &str, action: Action) -> ExecutionOutcome {
        let _guard = self.lock.acquire().await;
        info!("Executing {} {} on {}", action, symbol, self.gateway.venue_name());

        let outcome = self.run(symbol, action).await;
        let report = ExecutionReport::new(symbol, action, outcome);

        if report.outcome.is_failure() {
            error!("{}", report);
        } else {
            info!("{}", report);
        }
        self.notifier.notify(report.to_string());

        report.outcome
    }

    async fn run(&self, symbol: &str, action: Action) -> ExecutionOutcome {
        let price = match self.gateway.fetch_ticker(symbol).await {
            Ok(price) if price > Decimal::ZERO => price,
            Ok(price) => {
                let invalid = TradeError::InvalidPrice {
                    symbol: symbol.to_string(),
                    price,
                };
                return failed(FailureStage::Ticker, invalid.to_string(), None, None);
            }
            Err(e) => return failed(FailureStage::Ticker, e.to_string(), None, None),
        };

        let position = match self.gateway.fetch_position(symbol).await {
            Ok(position) => position,
            Err(e) => return failed(FailureStage::Position, e.to_string(), Some(price), None),
        };

        match action.entry_side() {
            None => self.close_position(symbol, position, price).await,
            Some(side) => self.enter(symbol, side, position, price).await,
        }
    }

    /// FLAT: close whatever is open; the order result is terminal
    async fn close_position(
        &self,
        symbol: &str,
        position: Decimal,
        price: Decimal,
    ) -> ExecutionOutcome {
        let Some(side) = Side::closing(position) else {
            return ExecutionOutcome::NoPosition { price };
        };

        let order = MarketOrder::close(symbol, side, position.abs(), self.sizing.leverage);
        match self.gateway.submit_market_order(&order).await {
            Ok(receipt) => ExecutionOutcome::Closed {
                quantity: order.quantity,
                price,
                fill_price: receipt.average_price,
            },
            Err(e) => failed(FailureStage::Close, e.to_string(), Some(price), None),
        }
    }

    /// BUY/SELL: flatten an opposing position, then size and submit the entry
    async fn enter(
        &self,
        symbol: &str,
        side: Side,
        position: Decimal,
        price: Decimal,
    ) -> ExecutionOutcome {
        let mut flipped = None;

        if side.opposes(position) {
            let order =
                MarketOrder::close(symbol, side, position.abs(), self.sizing.leverage);
            if let Err(e) = self.gateway.submit_market_order(&order).await {
                return failed(FailureStage::FlipClose, e.to_string(), Some(price), None);
            }
            info!(
                "Closed opposing position {} on {}, settling for {:?}",
                position, symbol, self.settings.settlement_delay
            );
            flipped = Some(position);
            tokio::time::sleep(self.settings.settlement_delay).await;
        }

        let margin = match self.gateway.fetch_available_margin().await {
            Ok(margin) => margin,
            Err(e) => return failed(FailureStage::Margin, e.to_string(), Some(price), flipped),
        };

        if margin.free <= self.settings.min_free_margin {
            warn!(
                "Free margin {} at or below {} for {}",
                margin.free, self.settings.min_free_margin, symbol
            );
            return ExecutionOutcome::InsufficientBalance {
                free: margin.free,
                threshold: self.settings.min_free_margin,
                price,
                flipped,
            };
        }

        let quantity = match self.sizing.quantity(margin.free, price) {
            Ok(quantity) => quantity,
            Err(e) => return failed(FailureStage::Sizing, e.to_string(), Some(price), flipped),
        };
        if quantity <= Decimal::ZERO {
            return ExecutionOutcome::InsufficientBalance {
                free: margin.free,
                threshold: self.settings.min_free_margin,
                price,
                flipped,
            };
        }

        let order = MarketOrder::entry(symbol, side, quantity, self.sizing.leverage);
        match self.gateway.submit_market_order(&order).await {
            Ok(receipt) => ExecutionOutcome::Opened {
                side,
                quantity,
                price,
                fill_price: receipt.average_price,
                flipped,
            },
            Err(e) => failed(FailureStage::Entry, e.to_string(), Some(price), flipped),
        }
    }
}

fn failed(
    stage: FailureStage,
    reason: String,
    price: Option<Decimal>,
    flipped: Option<Decimal>,
) -> ExecutionOutcome {
    ExecutionOutcome::Failed {
        stage,
        reason,
        price,
        flipped,
    }
}

#[async_trait]
impl ActionHandler for TradeExecutor {
    async fn handle(&self, symbol: String, action: Action) {
        self.execute(&symbol, action).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::channels::create_notification_channel;
    use crate::common::traits::MockExchangeGateway;
    use crate::common::types::{MarginSnapshot, OrderReceipt};
    use mockall::Sequence;
    use rust_decimal_macros::dec;
    use tokio::sync::mpsc;

    fn receipt(order: &MarketOrder, fill: Decimal) -> OrderReceipt {
        OrderReceipt {
            order_id: "1".to_string(),
            symbol: order.symbol.clone(),
            side: order.side,
            quantity: order.quantity,
            average_price: Some(fill),
            status: "FILLED".to_string(),
            timestamp: chrono::Utc::now(),
        }
    }

    fn executor(gateway: MockExchangeGateway) -> (TradeExecutor, mpsc::Receiver<String>) {
        let (sender, receiver) = create_notification_channel();
        let executor = TradeExecutor::new(
            Arc::new(gateway),
            NotificationDispatcher::from_sender(sender),
            ExecutionLock::default(),
            SizingPolicy::new(5, dec!(0.99)).with_quantity_precision(Some(3)),
            ExecutorSettings {
                settlement_delay: Duration::from_secs(2),
                min_free_margin: dec!(1.0),
            },
        );
        (executor, receiver)
    }

    fn base_gateway() -> MockExchangeGateway {
        let mut gateway = MockExchangeGateway::new();
        gateway.expect_venue_name().return_const("mock");
        gateway
    }

    fn drain(receiver: &mut mpsc::Receiver<String>) -> Vec<String> {
        let mut messages = Vec::new();
        while let Ok(message) = receiver.try_recv() {
            messages.push(message);
        }
        messages
    }

    #[tokio::test]
    async fn test_flat_without_position_is_noop() {
        let mut gateway = base_gateway();
        gateway.expect_fetch_ticker().returning(|_| Ok(dec!(100)));
        gateway
            .expect_fetch_position()
            .withf(|symbol| symbol.to_string() == "BTCUSDT")
            .returning(|_| Ok(Decimal::ZERO));
        gateway.expect_submit_market_order().never();
        gateway.expect_fetch_available_margin().never();

        let (executor, mut notes) = executor(gateway);
        let outcome = executor.execute("BTCUSDT", Action::Flat).await;

        assert_eq!(outcome, ExecutionOutcome::NoPosition { price: dec!(100) });
        assert_eq!(drain(&mut notes), vec!["BTCUSDT FLAT 100.00 - no open position"]);
    }

    #[tokio::test]
    async fn test_flat_closes_long_with_reduce_only_sell() {
        let mut gateway = base_gateway();
        gateway.expect_fetch_ticker().returning(|_| Ok(dec!(100)));
        gateway.expect_fetch_position().returning(|_| Ok(dec!(2.5)));
        gateway
            .expect_submit_market_order()
            .withf(|o| o.reduce_only && o.side == Side::Sell && o.quantity == dec!(2.5))
            .times(1)
            .returning(|o| Ok(receipt(o, dec!(99.5))));
        gateway.expect_fetch_available_margin().never();

        let (executor, mut notes) = executor(gateway);
        let outcome = executor.execute("BTCUSDT", Action::Flat).await;

        assert!(matches!(outcome, ExecutionOutcome::Closed { quantity, .. } if quantity == dec!(2.5)));
        assert_eq!(drain(&mut notes), vec!["BTCUSDT FLAT 99.50 closed 2.5"]);
    }

    #[tokio::test]
    async fn test_ticker_failure_aborts_before_anything_else() {
        let mut gateway = base_gateway();
        gateway
            .expect_fetch_ticker()
            .returning(|_| Err(TradeError::Timeout("ticker".to_string())));
        gateway.expect_fetch_position().never();
        gateway.expect_submit_market_order().never();

        let (executor, mut notes) = executor(gateway);
        let outcome = executor.execute("BTCUSDT", Action::Buy).await;

        assert!(matches!(
            outcome,
            ExecutionOutcome::Failed { stage: FailureStage::Ticker, .. }
        ));
        assert_eq!(drain(&mut notes).len(), 1);
    }

    #[tokio::test]
    async fn test_zero_price_is_rejected() {
        let mut gateway = base_gateway();
        gateway.expect_fetch_ticker().returning(|_| Ok(Decimal::ZERO));
        gateway.expect_fetch_position().never();
        gateway.expect_submit_market_order().never();

        let (executor, mut notes) = executor(gateway);
        let outcome = executor.execute("BTCUSDT", Action::Sell).await;

        assert!(matches!(
            outcome,
            ExecutionOutcome::Failed { stage: FailureStage::Ticker, price: None, .. }
        ));
        assert_eq!(
            drain(&mut notes),
            vec!["BTCUSDT SELL - failed at price fetch: Invalid price for BTCUSDT: 0"]
        );
    }

    #[tokio::test]
    async fn test_insufficient_margin_skips_order() {
        let mut gateway = base_gateway();
        gateway.expect_fetch_ticker().returning(|_| Ok(dec!(100)));
        gateway.expect_fetch_position().returning(|_| Ok(Decimal::ZERO));
        gateway
            .expect_fetch_available_margin()
            .times(1)
            .returning(|| Ok(MarginSnapshot::new(dec!(0.5), dec!(0), dec!(0.5))));
        gateway.expect_submit_market_order().never();

        let (executor, mut notes) = executor(gateway);
        let outcome = executor.execute("BTCUSDT", Action::Buy).await;

        assert!(matches!(outcome, ExecutionOutcome::InsufficientBalance { .. }));
        let messages = drain(&mut notes);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("insufficient balance"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flip_closes_short_before_sizing_entry() {
        let mut seq = Sequence::new();
        let mut gateway = base_gateway();
        gateway
            .expect_fetch_ticker()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(dec!(100)));
        gateway
            .expect_fetch_position()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(dec!(-3)));
        gateway
            .expect_submit_market_order()
            .withf(|o| o.reduce_only && o.side == Side::Buy && o.quantity == dec!(3))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|o| Ok(receipt(o, dec!(100))));
        gateway
            .expect_fetch_available_margin()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(MarginSnapshot::new(dec!(200), dec!(0), dec!(200))));
        gateway
            .expect_submit_market_order()
            .withf(|o| !o.reduce_only && o.side == Side::Buy)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|o| Ok(receipt(o, dec!(100.2))));

        let (executor, mut notes) = executor(gateway);
        let started = tokio::time::Instant::now();
        let outcome = executor.execute("BTCUSDT", Action::Buy).await;

        assert!(started.elapsed() >= Duration::from_secs(2));
        // 200 * 0.99 * 5 / 100 = 9.9
        assert_eq!(
            outcome,
            ExecutionOutcome::Opened {
                side: Side::Buy,
                quantity: dec!(9.9),
                price: dec!(100),
                fill_price: Some(dec!(100.2)),
                flipped: Some(dec!(-3)),
            }
        );
        assert_eq!(
            drain(&mut notes),
            vec!["BTCUSDT BUY 100.20 qty 9.9 after closing short 3"]
        );
    }

    #[tokio::test]
    async fn test_same_side_position_adds_without_closing() {
        let mut gateway = base_gateway();
        gateway.expect_fetch_ticker().returning(|_| Ok(dec!(50)));
        gateway.expect_fetch_position().returning(|_| Ok(dec!(1)));
        gateway
            .expect_fetch_available_margin()
            .returning(|| Ok(MarginSnapshot::new(dec!(10), dec!(10), dec!(20))));
        gateway
            .expect_submit_market_order()
            .withf(|o| !o.reduce_only && o.side == Side::Buy)
            .times(1)
            .returning(|o| Ok(receipt(o, dec!(50))));

        let (executor, _notes) = executor(gateway);
        let outcome = executor.execute("BTCUSDT", Action::Buy).await;

        assert!(matches!(outcome, ExecutionOutcome::Opened { flipped: None, .. }));
    }

    #[tokio::test]
    async fn test_entry_rejection_is_reported_not_raised() {
        let mut gateway = base_gateway();
        gateway.expect_fetch_ticker().returning(|_| Ok(dec!(100)));
        gateway.expect_fetch_position().returning(|_| Ok(Decimal::ZERO));
        gateway
            .expect_fetch_available_margin()
            .returning(|| Ok(MarginSnapshot::new(dec!(50), dec!(0), dec!(50))));
        gateway.expect_submit_market_order().returning(|_| {
            Err(TradeError::ExchangeRejected {
                code: -2019,
                message: "Margin is insufficient.".to_string(),
            })
        });

        let (executor, mut notes) = executor(gateway);
        let outcome = executor.execute("BTCUSDT", Action::Sell).await;

        assert!(matches!(
            outcome,
            ExecutionOutcome::Failed { stage: FailureStage::Entry, .. }
        ));
        assert_eq!(
            drain(&mut notes),
            vec!["BTCUSDT SELL 100.00 - failed at entry order: Exchange rejected request (code -2019): Margin is insufficient."]
        );
    }

    #[tokio::test]
    async fn test_flip_close_failure_stops_before_entry() {
        let mut gateway = base_gateway();
        gateway.expect_fetch_ticker().returning(|_| Ok(dec!(100)));
        gateway.expect_fetch_position().returning(|_| Ok(dec!(4)));
        gateway
            .expect_submit_market_order()
            .times(1)
            .returning(|_| Err(TradeError::Timeout("order".to_string())));
        gateway.expect_fetch_available_margin().never();

        let (executor, _notes) = executor(gateway);
        let outcome = executor.execute("BTCUSDT", Action::Sell).await;

        assert!(matches!(
            outcome,
            ExecutionOutcome::Failed { stage: FailureStage::FlipClose, .. }
        ));
    }

    #[tokio::test]
    async fn test_position_failure_stops_the_run() {
        let mut gateway = base_gateway();
        gateway.expect_fetch_ticker().returning(|_| Ok(dec!(100)));
        gateway
            .expect_fetch_position()
            .times(1)
            .returning(|_| Err(TradeError::Timeout("positionRisk".to_string())));
        gateway.expect_fetch_available_margin().never();
        gateway.expect_submit_market_order().never();

        let (executor, mut notes) = executor(gateway);
        let outcome = executor.execute("BTCUSDT", Action::Buy).await;

        assert!(matches!(
            outcome,
            ExecutionOutcome::Failed {
                stage: FailureStage::Position,
                price: Some(_),
                flipped: None,
                ..
            }
        ));
        assert_eq!(
            drain(&mut notes),
            vec!["BTCUSDT BUY 100.00 - failed at position fetch: Operation timed out: positionRisk"]
        );
    }

    #[tokio::test]
    async fn test_flat_close_failure_is_terminal() {
        let mut gateway = base_gateway();
        gateway.expect_fetch_ticker().returning(|_| Ok(dec!(100)));
        gateway.expect_fetch_position().returning(|_| Ok(dec!(2.5)));
        gateway
            .expect_submit_market_order()
            .withf(|o| o.reduce_only && o.side == Side::Sell)
            .times(1)
            .returning(|_| Err(TradeError::Timeout("order".to_string())));
        gateway.expect_fetch_available_margin().never();

        let (executor, mut notes) = executor(gateway);
        let outcome = executor.execute("BTCUSDT", Action::Flat).await;

        assert!(matches!(
            outcome,
            ExecutionOutcome::Failed { stage: FailureStage::Close, .. }
        ));
        assert_eq!(
            drain(&mut notes),
            vec!["BTCUSDT FLAT 100.00 - failed at close order: Operation timed out: order"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_margin_failure_after_flip_mentions_the_close() {
        let mut gateway = base_gateway();
        gateway.expect_fetch_ticker().returning(|_| Ok(dec!(100)));
        gateway.expect_fetch_position().returning(|_| Ok(dec!(-3)));
        gateway
            .expect_submit_market_order()
            .withf(|o| o.reduce_only && o.side == Side::Buy && o.quantity == dec!(3))
            .times(1)
            .returning(|o| Ok(receipt(o, dec!(100))));
        gateway
            .expect_fetch_available_margin()
            .times(1)
            .returning(|| Err(TradeError::Timeout("balance".to_string())));

        let (executor, mut notes) = executor(gateway);
        let outcome = executor.execute("BTCUSDT", Action::Buy).await;

        assert_eq!(
            outcome,
            ExecutionOutcome::Failed {
                stage: FailureStage::Margin,
                reason: "Operation timed out: balance".to_string(),
                price: Some(dec!(100)),
                flipped: Some(dec!(-3)),
            }
        );
        assert_eq!(
            drain(&mut notes),
            vec!["BTCUSDT BUY 100.00 - failed at margin fetch: Operation timed out: balance after closing short 3"]
        );
    }

    #[tokio::test]
    async fn test_dust_quantity_counts_as_insufficient_balance() {
        let mut gateway = base_gateway();
        gateway.expect_fetch_ticker().returning(|_| Ok(dec!(100000)));
        gateway.expect_fetch_position().returning(|_| Ok(Decimal::ZERO));
        // 1.5 * 0.99 * 5 / 100000 = 0.0000742..., truncated to 3 dp is zero
        gateway
            .expect_fetch_available_margin()
            .times(1)
            .returning(|| Ok(MarginSnapshot::new(dec!(1.5), dec!(0), dec!(1.5))));
        gateway.expect_submit_market_order().never();

        let (executor, mut notes) = executor(gateway);
        let outcome = executor.execute("BTCUSDT", Action::Buy).await;

        assert_eq!(
            outcome,
            ExecutionOutcome::InsufficientBalance {
                free: dec!(1.5),
                threshold: dec!(1.0),
                price: dec!(100000),
                flipped: None,
            }
        );
        assert_eq!(
            drain(&mut notes),
            vec!["BTCUSDT BUY 100000.00 - insufficient balance: free=1.500000, min=1.0"]
        );
    }
}
