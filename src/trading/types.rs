use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::types::{Action, Side};

/// Result of handing a signal to the debouncer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitStatus {
    /// This signal started a new debounce window for its symbol
    WindowOpened,
    /// This signal joined a window that was already open
    WindowJoined,
}

impl std::fmt::Display for SubmitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitStatus::WindowOpened => write!(f, "window_opened"),
            SubmitStatus::WindowJoined => write!(f, "window_joined"),
        }
    }
}

/// Step of an executor run that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Ticker,
    Position,
    FlipClose,
    Margin,
    Sizing,
    Close,
    Entry,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureStage::Ticker => "price fetch",
            FailureStage::Position => "position fetch",
            FailureStage::FlipClose => "closing opposite position",
            FailureStage::Margin => "margin fetch",
            FailureStage::Sizing => "sizing",
            FailureStage::Close => "close order",
            FailureStage::Entry => "entry order",
        };
        write!(f, "{}", name)
    }
}

/// Terminal result of one executor run
///
/// `flipped` holds the signed size of an opposing position that was
/// closed earlier in the same run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutionOutcome {
    /// Entry order accepted
    Opened {
        side: Side,
        quantity: Decimal,
        price: Decimal,
        fill_price: Option<Decimal>,
        flipped: Option<Decimal>,
    },
    /// FLAT closed an open position
    Closed {
        quantity: Decimal,
        price: Decimal,
        fill_price: Option<Decimal>,
    },
    /// FLAT with nothing open
    NoPosition { price: Decimal },
    /// Free margin at or below the usable threshold
    InsufficientBalance {
        free: Decimal,
        threshold: Decimal,
        price: Decimal,
        flipped: Option<Decimal>,
    },
    /// A gateway call or sizing failed; the run stopped there
    Failed {
        stage: FailureStage,
        reason: String,
        price: Option<Decimal>,
        flipped: Option<Decimal>,
    },
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ExecutionOutcome::Opened { .. } | ExecutionOutcome::Closed { .. }
        )
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ExecutionOutcome::Failed { .. })
    }
}

/// One finished run, rendered as the notification text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub symbol: String,
    pub action: Action,
    pub outcome: ExecutionOutcome,
}

impl ExecutionReport {
    pub fn new(symbol: impl Into<String>, action: Action, outcome: ExecutionOutcome) -> Self {
        Self {
            symbol: symbol.into(),
            action,
            outcome,
        }
    }
}

fn price(value: Decimal) -> String {
    format!("{:.2}", value.round_dp(2))
}

fn flip_note(flipped: &Option<Decimal>) -> String {
    match flipped {
        Some(size) if *size > Decimal::ZERO => format!(" after closing long {}", size.normalize()),
        Some(size) if *size < Decimal::ZERO => {
            format!(" after closing short {}", size.abs().normalize())
        }
        _ => String::new(),
    }
}

impl std::fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let head = format!("{} {}", self.symbol, self.action);
        match &self.outcome {
            ExecutionOutcome::Opened {
                quantity,
                price: last,
                fill_price,
                flipped,
                ..
            } => write!(
                f,
                "{} {} qty {}{}",
                head,
                price(fill_price.unwrap_or(*last)),
                quantity.normalize(),
                flip_note(flipped)
            ),
            ExecutionOutcome::Closed {
                quantity,
                price: last,
                fill_price,
            } => write!(
                f,
                "{} {} closed {}",
                head,
                price(fill_price.unwrap_or(*last)),
                quantity.normalize()
            ),
            ExecutionOutcome::NoPosition { price: last } => {
                write!(f, "{} {} - no open position", head, price(*last))
            }
            ExecutionOutcome::InsufficientBalance {
                free,
                threshold,
                price: last,
                flipped,
            } => write!(
                f,
                "{} {} - insufficient balance: free={:.6}, min={}{}",
                head,
                price(*last),
                free,
                threshold,
                flip_note(flipped)
            ),
            ExecutionOutcome::Failed {
                stage,
                reason,
                price: last,
                flipped,
            } => match last {
                Some(last) => write!(
                    f,
                    "{} {} - failed at {}: {}{}",
                    head,
                    price(*last),
                    stage,
                    reason,
                    flip_note(flipped)
                ),
                None => write!(f, "{} - failed at {}: {}", head, stage, reason),
            },
        }
    }
}
