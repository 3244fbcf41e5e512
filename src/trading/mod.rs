//! Trading module - signal debouncing, serialized execution and sizing
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 WEBHOOK (never blocks)                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Signal arrives                                             │
//! │       │                                                     │
//! │       ▼                                                     │
//! │  SignalDebouncer.submit() → window_opened / window_joined   │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 FLUSH TASK (one per open window)            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  sleep(window) → take buffer → BUY > SELL > FLAT            │
//! │       │                                                     │
//! │       ▼ (spawned, not awaited)                              │
//! │  TradeExecutor.execute()                                    │
//! │    - waits on the ExecutionLock (one run per account)       │
//! │    - price → position → [flip close + settle] → margin      │
//! │    - SizingPolicy → market order → one notification         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`SignalDebouncer`]: per-symbol windows over a guarded map
//! - [`TradeExecutor`]: position reconciliation against the gateway
//! - [`ExecutionLock`]: process-wide gate keyed by [`AccountId`]
//! - [`SizingPolicy`]: quantity from free margin, leverage and price

mod debouncer;
mod executor;
mod lock;
mod sizing;
mod types;

pub use debouncer::{resolve_action, ActionHandler, SignalDebouncer};

pub use executor::{ExecutorSettings, TradeExecutor};

pub use lock::{AccountId, ExecutionGuard, ExecutionLock};

pub use sizing::{order_size, SizingError, SizingPolicy};

pub use types::{ExecutionOutcome, ExecutionReport, FailureStage, SubmitStatus};
