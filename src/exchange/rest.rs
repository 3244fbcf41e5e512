//! REST API client for USD-margined perpetual futures

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use super::auth::{signed_query, API_KEY_HEADER};
use super::messages::*;
use crate::common::errors::{Result, TradeError};
use crate::common::traits::ExchangeGateway;
use crate::common::types::{MarginSnapshot, MarketOrder, OrderReceipt, Side};
use crate::config::types::{ApiCredentials, ExchangeConfig};

/// REST API client for the futures exchange
#[derive(Debug)]
pub struct FuturesRestClient {
    /// HTTP client
    client: Client,
    /// Base URL for the REST API
    base_url: String,
    /// Credentials for signed endpoints
    credentials: Option<ApiCredentials>,
    /// Asset the account margin is read from
    margin_asset: String,
    /// recvWindow sent with signed requests
    recv_window_ms: u64,
    /// Leverage last applied per symbol
    leverage_set: RwLock<HashMap<String, u32>>,
}

impl FuturesRestClient {
    /// Create a new REST client (unauthenticated)
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(10))
    }

    /// Create a new REST client with custom timeout
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TradeError::Internal(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials: None,
            margin_asset: "USDT".to_string(),
            recv_window_ms: 5000,
            leverage_set: RwLock::new(HashMap::new()),
        })
    }

    /// Create a client from configuration
    pub fn from_config(config: &ExchangeConfig, timeout: Duration) -> Result<Self> {
        let mut client = Self::with_timeout(&config.rest_url, timeout)?
            .with_margin_asset(&config.margin_asset)
            .with_recv_window(config.recv_window_ms);

        if let Some(credentials) = config.credentials() {
            client = client.with_credentials(credentials);
        }

        Ok(client)
    }

    /// Set API credentials for signed requests
    pub fn with_credentials(mut self, credentials: ApiCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_margin_asset(mut self, asset: &str) -> Self {
        self.margin_asset = asset.to_string();
        self
    }

    pub fn with_recv_window(mut self, recv_window_ms: u64) -> Self {
        self.recv_window_ms = recv_window_ms;
        self
    }

    fn credentials(&self) -> Result<&ApiCredentials> {
        self.credentials
            .as_ref()
            .ok_or_else(|| TradeError::Authentication("API credentials not configured".to_string()))
    }

    /// Build a signed URL for an endpoint
    fn signed_url(&self, path: &str, params: &[(&str, String)]) -> Result<String> {
        let creds = self.credentials()?;
        let query = signed_query(
            &creds.api_secret,
            params,
            self.recv_window_ms,
            chrono::Utc::now().timestamp_millis(),
        )?;
        Ok(format!("{}{}?{}", self.base_url, path, query))
    }

    async fn signed_get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = self.signed_url(path, params)?;
        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.credentials()?.api_key)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn signed_post<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = self.signed_url(path, params)?;
        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.credentials()?.api_key)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Map non-2xx responses to errors and decode the body otherwise
    async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 {
            let retry_after_seconds = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let body = response.text().await.unwrap_or_default();
            return Err(TradeError::RateLimit {
                message: body,
                retry_after_seconds,
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&body) {
                return Err(TradeError::ExchangeRejected {
                    code: api_error.code,
                    message: api_error.msg,
                });
            }
            if status == StatusCode::UNAUTHORIZED {
                return Err(TradeError::Authentication(body));
            }
            return Err(TradeError::InvalidResponse(format!(
                "Server returned status {}: {}",
                status, body
            )));
        }

        Ok(response.json().await?)
    }

    // ========================================================================
    // Public Endpoints (No Authentication Required)
    // ========================================================================

    /// Get the latest price for a symbol
    #[instrument(skip(self))]
    pub async fn get_ticker_price(&self, symbol: &str) -> Result<Decimal> {
        let url = format!("{}/fapi/v1/ticker/price?symbol={}", self.base_url, symbol);
        debug!("Fetching ticker from: {}", url);

        let response = self.client.get(&url).send().await?;
        let ticker: TickerPriceResponse = Self::parse_response(response).await?;
        parse_decimal("price", &ticker.price)
    }

    // ========================================================================
    // Signed Endpoints
    // ========================================================================

    /// Get the net signed position for a symbol
    ///
    /// Sums all position entries for the symbol so one-way and hedge mode
    /// both yield the net exposure.
    #[instrument(skip(self))]
    pub async fn get_position_amount(&self, symbol: &str) -> Result<Decimal> {
        let entries: Vec<PositionRiskEntry> = self
            .signed_get("/fapi/v2/positionRisk", &[("symbol", symbol.to_string())])
            .await?;

        let mut net = Decimal::ZERO;
        for entry in entries.iter().filter(|e| e.symbol == symbol) {
            let amount = parse_decimal("positionAmt", &entry.position_amt)?;
            net += match entry.position_side.as_str() {
                "SHORT" => -amount.abs(),
                _ => amount,
            };
        }
        debug!("Position for {}: {}", symbol, net);
        Ok(net)
    }

    /// Get the margin balances of the configured asset
    #[instrument(skip(self))]
    pub async fn get_margin(&self) -> Result<MarginSnapshot> {
        let balances: Vec<BalanceEntry> = self.signed_get("/fapi/v2/balance", &[]).await?;

        match balances.iter().find(|b| b.asset == self.margin_asset) {
            Some(balance) => {
                let total = parse_decimal("balance", &balance.balance)?;
                let free = parse_decimal("availableBalance", &balance.available_balance)?;
                Ok(MarginSnapshot::new(free, total - free, total))
            }
            None => {
                warn!("No {} balance reported, treating as empty", self.margin_asset);
                Ok(MarginSnapshot::default())
            }
        }
    }

    /// Set leverage for a symbol, skipping the call if already applied
    #[instrument(skip(self))]
    pub async fn ensure_leverage(&self, symbol: &str, leverage: u32) -> Result<()> {
        if self.leverage_set.read().await.get(symbol) == Some(&leverage) {
            return Ok(());
        }

        let response: LeverageResponse = self
            .signed_post(
                "/fapi/v1/leverage",
                &[
                    ("symbol", symbol.to_string()),
                    ("leverage", leverage.to_string()),
                ],
            )
            .await?;
        info!("Leverage for {} set to {}x", response.symbol, response.leverage);

        self.leverage_set
            .write()
            .await
            .insert(symbol.to_string(), response.leverage);
        Ok(())
    }

    /// Place a market order
    #[instrument(skip(self), fields(symbol = %order.symbol, side = %order.side))]
    pub async fn place_market_order(&self, order: &MarketOrder) -> Result<OrderReceipt> {
        if !order.reduce_only {
            self.ensure_leverage(&order.symbol, order.leverage).await?;
        }

        let mut params = vec![
            ("symbol", order.symbol.clone()),
            ("side", order.side.to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", order.quantity.normalize().to_string()),
            ("newOrderRespType", "RESULT".to_string()),
        ];
        if order.reduce_only {
            params.push(("reduceOnly", "true".to_string()));
        }

        let response: OrderResponse = self.signed_post("/fapi/v1/order", &params).await?;
        info!(
            "Order {} {} {} status {}",
            response.order_id, response.side, response.symbol, response.status
        );
        convert_order_response(response, order)
    }
}

fn parse_decimal(field: &str, raw: &str) -> Result<Decimal> {
    raw.parse()
        .map_err(|e| TradeError::InvalidResponse(format!("Invalid {}: {} ({})", field, raw, e)))
}

/// Convert the exchange order response into the unified receipt
fn convert_order_response(response: OrderResponse, order: &MarketOrder) -> Result<OrderReceipt> {
    let quantity = match response.executed_qty.as_deref() {
        Some(qty) => parse_decimal("executedQty", qty)?,
        None => order.quantity,
    };
    let average_price = match response.avg_price.as_deref() {
        Some(price) => Some(parse_decimal("avgPrice", price)?).filter(|p| *p > Decimal::ZERO),
        None => None,
    };
    let side = match response.side.as_str() {
        "BUY" => Side::Buy,
        "SELL" => Side::Sell,
        other => {
            return Err(TradeError::InvalidResponse(format!("Invalid side: {}", other)));
        }
    };
    let timestamp = response
        .update_time
        .and_then(chrono::DateTime::<chrono::Utc>::from_timestamp_millis)
        .unwrap_or_else(chrono::Utc::now);

    Ok(OrderReceipt {
        order_id: response.order_id.to_string(),
        symbol: response.symbol,
        side,
        quantity,
        average_price,
        status: response.status,
        timestamp,
    })
}

#[async_trait]
impl ExchangeGateway for FuturesRestClient {
    async fn fetch_ticker(&self, symbol: &str) -> Result<Decimal> {
        self.get_ticker_price(symbol).await
    }

    async fn fetch_position(&self, symbol: &str) -> Result<Decimal> {
        self.get_position_amount(symbol).await
    }

    async fn fetch_available_margin(&self) -> Result<MarginSnapshot> {
        self.get_margin().await
    }

    async fn submit_market_order(&self, order: &MarketOrder) -> Result<OrderReceipt> {
        self.place_market_order(order).await
    }

    fn venue_name(&self) -> &'static str {
        "futures-rest"
    }
}
