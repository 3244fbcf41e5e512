//! Configuration loader

use config::{Config, Environment, File};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;

use super::types::{AppConfig, MAX_DELAY_SECONDS};
use crate::common::errors::{Result, TradeError};

/// Load configuration from file and environment variables
///
/// Priority (highest to lowest):
/// 1. Environment variables (`APP_<SECTION>__<KEY>`, e.g. `APP_TRADING__LEVERAGE`)
/// 2. Configuration file (TOML format)
/// 3. Default values
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        if Path::new(path).exists() {
            builder = builder.add_source(File::with_name(path).required(false));
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("APP")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder
        .build()
        .map_err(|e| TradeError::Configuration(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| TradeError::Configuration(e.to_string()))
}

/// Load configuration from the flat environment variables of a plain deployment
///
/// `WEBHOOK_SECRET`, `EXCHANGE_API_KEY`, `EXCHANGE_API_SECRET`,
/// `DISCORD_WEBHOOK_URL`, `SYMBOL`, `LEVERAGE` and friends. Anything
/// unset keeps its default.
pub fn load_from_env() -> Result<AppConfig> {
    dotenvy::dotenv().ok();
    load_from_vars(|key| std::env::var(key).ok())
}

fn load_from_vars<F>(lookup: F) -> Result<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let vars = Vars(lookup);
    let mut config = AppConfig::default();

    config.webhook.secret = vars.opt("WEBHOOK_SECRET");
    if let Some(symbol) = vars.opt("SYMBOL") {
        config.webhook.default_symbol = symbol;
    }
    if let Some(symbols) = vars.opt("ALLOWED_SYMBOLS") {
        config.webhook.allowed_symbols = symbols
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Some(bind) = vars.opt("BIND_ADDRESS") {
        config.webhook.bind_address = bind;
    }

    config.exchange.api_key = vars.opt("EXCHANGE_API_KEY");
    config.exchange.api_secret = vars.opt("EXCHANGE_API_SECRET");
    if let Some(url) = vars.opt("EXCHANGE_REST_URL") {
        config.exchange.rest_url = url;
    }
    if let Some(asset) = vars.opt("MARGIN_ASSET") {
        config.exchange.margin_asset = asset;
    }

    config.discord.webhook_url = vars.opt("DISCORD_WEBHOOK_URL");

    if let Some(leverage) = vars.parse::<u32>("LEVERAGE")? {
        config.trading.leverage = leverage;
    }
    if let Some(window) = vars.parse::<f64>("DEBOUNCE_SECONDS")? {
        config.trading.debounce_window_seconds = window;
    }
    if let Some(delay) = vars.parse::<f64>("SETTLEMENT_DELAY_SECONDS")? {
        config.trading.settlement_delay_seconds = delay;
    }
    if let Some(factor) = vars.parse::<Decimal>("SAFETY_FACTOR")? {
        config.trading.safety_factor = factor;
    }
    if let Some(min) = vars.parse::<Decimal>("MIN_FREE_MARGIN")? {
        config.trading.min_free_margin = min;
    }
    // "none" turns truncation off
    match vars.opt("QUANTITY_PRECISION") {
        Some(raw) if raw.trim().eq_ignore_ascii_case("none") => {
            config.trading.quantity_precision = None;
        }
        Some(_) => {
            config.trading.quantity_precision = vars.parse::<u32>("QUANTITY_PRECISION")?;
        }
        None => {}
    }

    if let Some(timeout) = vars.parse::<u64>("REQUEST_TIMEOUT_SECONDS")? {
        config.settings.request_timeout_seconds = timeout;
    }

    Ok(config)
}

/// Flat variable source; blank values count as unset
struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn opt(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn parse<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.opt(key) {
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| TradeError::Configuration(format!("{}={}: {}", key, raw, e))),
            None => Ok(None),
        }
    }
}

impl AppConfig {
    /// Names of required settings that are missing
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.webhook.secret.is_none() {
            missing.push("WEBHOOK_SECRET");
        }
        if self.exchange.api_key.is_none() {
            missing.push("EXCHANGE_API_KEY");
        }
        if self.exchange.api_secret.is_none() {
            missing.push("EXCHANGE_API_SECRET");
        }
        missing
    }

    /// Check value ranges and URL formats
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.exchange.rest_url).map_err(|e| {
            TradeError::Configuration(format!("invalid exchange rest_url: {}", e))
        })?;

        if let Some(ref webhook_url) = self.discord.webhook_url {
            url::Url::parse(webhook_url).map_err(|e| {
                TradeError::Configuration(format!("invalid discord webhook_url: {}", e))
            })?;
        }

        if self.trading.leverage == 0 {
            return Err(TradeError::Configuration(
                "leverage must be at least 1".to_string(),
            ));
        }
        if self.trading.safety_factor <= Decimal::ZERO || self.trading.safety_factor > Decimal::ONE
        {
            return Err(TradeError::Configuration(format!(
                "safety_factor must be in (0, 1], got {}",
                self.trading.safety_factor
            )));
        }
        for (name, value) in [
            ("debounce_window_seconds", self.trading.debounce_window_seconds),
            ("settlement_delay_seconds", self.trading.settlement_delay_seconds),
        ] {
            if !(0.0..=MAX_DELAY_SECONDS).contains(&value) {
                return Err(TradeError::Configuration(format!(
                    "{} must be between 0 and {}, got {}",
                    name, MAX_DELAY_SECONDS, value
                )));
            }
        }

        Ok(())
    }
}
