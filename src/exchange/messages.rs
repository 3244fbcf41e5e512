//! Wire types for the futures REST API
//!
//! Numeric fields arrive as JSON strings and are parsed into `Decimal`
//! by the client.

use serde::{Deserialize, Serialize};

/// `GET /fapi/v1/ticker/price`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerPriceResponse {
    pub symbol: String,
    pub price: String,
    #[serde(default)]
    pub time: Option<i64>,
}

/// One entry of `GET /fapi/v2/positionRisk`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRiskEntry {
    pub symbol: String,
    pub position_amt: String,
    #[serde(default)]
    pub entry_price: Option<String>,
    #[serde(default)]
    pub mark_price: Option<String>,
    #[serde(default)]
    pub leverage: Option<String>,
    /// `BOTH` in one-way mode, `LONG`/`SHORT` in hedge mode
    #[serde(default = "default_position_side")]
    pub position_side: String,
}

fn default_position_side() -> String {
    "BOTH".to_string()
}

/// One entry of `GET /fapi/v2/balance`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceEntry {
    pub asset: String,
    pub balance: String,
    pub available_balance: String,
    #[serde(default)]
    pub cross_wallet_balance: Option<String>,
}

/// `POST /fapi/v1/order` with `newOrderRespType=RESULT`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_id: i64,
    pub symbol: String,
    pub status: String,
    #[serde(default)]
    pub client_order_id: Option<String>,
    pub side: String,
    #[serde(default)]
    pub orig_qty: Option<String>,
    #[serde(default)]
    pub executed_qty: Option<String>,
    #[serde(default)]
    pub avg_price: Option<String>,
    #[serde(default)]
    pub reduce_only: Option<bool>,
    #[serde(default)]
    pub update_time: Option<i64>,
}

/// `POST /fapi/v1/leverage`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeverageResponse {
    pub leverage: u32,
    pub symbol: String,
    #[serde(default)]
    pub max_notional_value: Option<String>,
}

/// Error body returned with non-2xx responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub code: i64,
    pub msg: String,
}
