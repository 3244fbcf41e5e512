//! Configuration types

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Exchange connectivity configuration
    #[serde(default)]
    pub exchange: ExchangeConfig,
    /// Inbound webhook configuration
    #[serde(default)]
    pub webhook: WebhookConfig,
    /// Discord notification configuration
    #[serde(default)]
    pub discord: DiscordConfig,
    /// Debounce, sizing and execution parameters
    #[serde(default)]
    pub trading: TradingConfig,
    /// General application settings
    #[serde(default)]
    pub settings: AppSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            exchange: ExchangeConfig::default(),
            webhook: WebhookConfig::default(),
            discord: DiscordConfig::default(),
            trading: TradingConfig::default(),
            settings: AppSettings::default(),
        }
    }
}

/// Futures exchange configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// API key sent with signed requests
    #[serde(default)]
    pub api_key: Option<String>,
    /// API secret used for HMAC signing
    #[serde(default)]
    pub api_secret: Option<String>,
    /// Base URL for the futures REST API
    #[serde(default = "default_exchange_rest_url")]
    pub rest_url: String,
    /// Asset the account margin is denominated in
    #[serde(default = "default_margin_asset")]
    pub margin_asset: String,
    /// Allowed clock drift for signed requests in milliseconds
    #[serde(default = "default_recv_window")]
    pub recv_window_ms: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_secret: None,
            rest_url: default_exchange_rest_url(),
            margin_asset: default_margin_asset(),
            recv_window_ms: default_recv_window(),
        }
    }
}

impl ExchangeConfig {
    /// Signing credentials, if both halves are configured
    pub fn credentials(&self) -> Option<ApiCredentials> {
        match (&self.api_key, &self.api_secret) {
            (Some(key), Some(secret)) => Some(ApiCredentials::new(key.clone(), secret.clone())),
            _ => None,
        }
    }
}

fn default_exchange_rest_url() -> String {
    "https://fapi.binance.com".to_string()
}

fn default_margin_asset() -> String {
    "USDT".to_string()
}

fn default_recv_window() -> u64 {
    5000
}

/// Inbound webhook configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Shared secret the alert source must include in every payload
    #[serde(default)]
    pub secret: Option<String>,
    /// Socket address the HTTP server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Symbol used when a payload omits one
    #[serde(default = "default_symbol")]
    pub default_symbol: String,
    /// Symbols accepted by the webhook (empty = any)
    #[serde(default)]
    pub allowed_symbols: Vec<String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret: None,
            bind_address: default_bind_address(),
            default_symbol: default_symbol(),
            allowed_symbols: Vec::new(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_symbol() -> String {
    "BTCUSDT".to_string()
}

/// Discord notification configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Webhook URL; notifications are only logged when unset
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Display name the messages are posted under
    #[serde(default)]
    pub username: Option<String>,
}

/// Debounce, sizing and execution parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Length of the per-symbol debounce window in seconds
    #[serde(default = "default_debounce_window")]
    pub debounce_window_seconds: f64,
    /// Leverage multiplier applied to free margin
    #[serde(default = "default_leverage")]
    pub leverage: u32,
    /// Fraction of free margin actually committed
    #[serde(default = "default_safety_factor")]
    pub safety_factor: Decimal,
    /// Pause after closing an opposing position before sizing the entry
    #[serde(default = "default_settlement_delay")]
    pub settlement_delay_seconds: f64,
    /// Free margin at or below this aborts an entry
    #[serde(default = "default_min_free_margin")]
    pub min_free_margin: Decimal,
    /// Decimal places order quantities are truncated to (none = no truncation)
    #[serde(default = "default_quantity_precision")]
    pub quantity_precision: Option<u32>,
}

/// Longest accepted debounce window or settlement delay
pub const MAX_DELAY_SECONDS: f64 = 3600.0;

impl TradingConfig {
    /// Zero when the configured value is not a usable duration
    pub fn debounce_window(&self) -> Duration {
        seconds(self.debounce_window_seconds)
    }

    pub fn settlement_delay(&self) -> Duration {
        seconds(self.settlement_delay_seconds)
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            debounce_window_seconds: default_debounce_window(),
            leverage: default_leverage(),
            safety_factor: default_safety_factor(),
            settlement_delay_seconds: default_settlement_delay(),
            min_free_margin: default_min_free_margin(),
            quantity_precision: default_quantity_precision(),
        }
    }
}

fn default_debounce_window() -> f64 {
    7.0
}

fn default_leverage() -> u32 {
    5
}

fn default_safety_factor() -> Decimal {
    dec!(0.99)
}

fn default_settlement_delay() -> f64 {
    2.0
}

fn default_min_free_margin() -> Decimal {
    dec!(1.0)
}

fn default_quantity_precision() -> Option<u32> {
    Some(3)
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Capacity of the outbound notification queue
    #[serde(default = "default_notification_queue")]
    pub notification_queue_size: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            request_timeout_seconds: default_request_timeout(),
            notification_queue_size: default_notification_queue(),
        }
    }
}

fn default_request_timeout() -> u64 {
    10
}

fn default_notification_queue() -> usize {
    crate::common::channels::DEFAULT_CHANNEL_SIZE
}

/// API credentials for signed requests
#[derive(Clone)]
pub struct ApiCredentials {
    pub api_key: String,
    pub api_secret: String,
}

impl ApiCredentials {
    pub fn new(api_key: String, api_secret: String) -> Self {
        Self {
            api_key,
            api_secret,
        }
    }
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}
