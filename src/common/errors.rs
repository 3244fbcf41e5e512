//! Error types for the application

use thiserror::Error;

/// Result type alias using our TradeError
pub type Result<T> = std::result::Result<T, TradeError>;

/// Main error type for gateway, notifier and configuration operations
#[derive(Error, Debug)]
pub enum TradeError {
    /// HTTP request errors
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Authentication / request signing errors
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded: {message}, retry after {retry_after_seconds:?} seconds")]
    RateLimit {
        message: String,
        retry_after_seconds: Option<u64>,
    },

    /// The exchange understood the request and refused it
    #[error("Exchange rejected request (code {code}): {message}")]
    ExchangeRejected { code: i64, message: String },

    /// Invalid API response
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// Ticker returned a missing or non-positive price
    #[error("Invalid price for {symbol}: {price}")]
    InvalidPrice {
        symbol: String,
        price: rust_decimal::Decimal,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Timeout errors
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Notification delivery errors
    #[error("Notification error: {0}")]
    Notification(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}
