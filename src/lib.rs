//! WebhookTrader Library
//!
//! Turns charting-platform alerts into futures market orders: alerts are
//! debounced per symbol, reconciled against the live position under a
//! process-wide lock, and sized from free margin.

pub mod common;
pub mod config;
pub mod exchange;
pub mod notify;
pub mod server;
pub mod trading;

// Re-export commonly used types
pub use common::errors::{Result, TradeError};
pub use common::traits::{ExchangeGateway, Notifier};
pub use common::types::{Action, MarginSnapshot, MarketOrder, OrderReceipt, Side, Signal};
pub use config::types::AppConfig;
pub use exchange::FuturesRestClient;
pub use notify::{DiscordNotifier, LogNotifier, NotificationDispatcher};
pub use server::{router, WebhookState};

// Trading core
pub use trading::{
    AccountId, ActionHandler, ExecutionLock, ExecutionOutcome, ExecutionReport, SignalDebouncer,
    SizingPolicy, SubmitStatus, TradeExecutor,
};
