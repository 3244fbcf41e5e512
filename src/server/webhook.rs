//! HTTP front door for charting alerts

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::common::types::{Action, Signal};
use crate::config::types::WebhookConfig;
use crate::trading::{ExecutionLock, SignalDebouncer, SubmitStatus};

/// Shared state for webhook handlers
#[derive(Clone)]
pub struct WebhookState {
    pub debouncer: SignalDebouncer,
    pub lock: ExecutionLock,
    pub secret: String,
    pub default_symbol: String,
    /// Accepted symbols (empty = any)
    pub allowed_symbols: Vec<String>,
}

impl WebhookState {
    pub fn new(
        debouncer: SignalDebouncer,
        lock: ExecutionLock,
        secret: impl Into<String>,
        config: &WebhookConfig,
    ) -> Self {
        Self {
            debouncer,
            lock,
            secret: secret.into(),
            default_symbol: normalize_symbol(&config.default_symbol),
            allowed_symbols: config
                .allowed_symbols
                .iter()
                .map(|s| normalize_symbol(s))
                .collect(),
        }
    }
}

/// Alert payload as sent by the charting platform
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
}

/// Accepted-signal response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub status: SubmitStatus,
    pub symbol: String,
    pub action: Action,
}

/// Rejections returned to the caller
#[derive(Debug)]
pub enum WebhookError {
    InvalidSecret,
    UnknownAction(String),
    /// Anything but ASCII letters and digits after normalization
    InvalidSymbol(String),
    SymbolNotAllowed(String),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            WebhookError::InvalidSecret => (StatusCode::UNAUTHORIZED, "invalid secret".to_string()),
            WebhookError::UnknownAction(action) => {
                (StatusCode::BAD_REQUEST, format!("unknown action: {}", action))
            }
            WebhookError::InvalidSymbol(symbol) => {
                (StatusCode::BAD_REQUEST, format!("invalid symbol: {}", symbol))
            }
            WebhookError::SymbolNotAllowed(symbol) => {
                (StatusCode::BAD_REQUEST, format!("symbol not allowed: {}", symbol))
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Build the router with `/webhook` and `/health`
pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook", post(handle_webhook))
        .route("/health", get(health))
        .with_state(Arc::new(state))
}

async fn handle_webhook(
    State(state): State<Arc<WebhookState>>,
    Json(payload): Json<WebhookPayload>,
) -> Result<Json<WebhookResponse>, WebhookError> {
    let provided = payload.secret.unwrap_or_default();
    if !constant_time_eq(provided.as_bytes(), state.secret.as_bytes()) {
        warn!("Rejected webhook with invalid secret");
        return Err(WebhookError::InvalidSecret);
    }

    let raw_action = payload.action.unwrap_or_default();
    let action: Action = raw_action
        .parse()
        .map_err(|_| WebhookError::UnknownAction(raw_action.clone()))?;

    let symbol = payload
        .symbol
        .as_deref()
        .map(normalize_symbol)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| state.default_symbol.clone());

    if !is_valid_symbol(&symbol) {
        warn!("Rejected webhook with malformed symbol {:?}", symbol);
        return Err(WebhookError::InvalidSymbol(symbol));
    }

    if !state.allowed_symbols.is_empty() && !state.allowed_symbols.contains(&symbol) {
        warn!("Rejected webhook for unlisted symbol {}", symbol);
        return Err(WebhookError::SymbolNotAllowed(symbol));
    }

    let status = state.debouncer.submit(Signal::new(symbol.clone(), action));
    info!("Accepted {} {} ({})", symbol, action, status);

    Ok(Json(WebhookResponse {
        status,
        symbol,
        action,
    }))
}

async fn health(State(state): State<Arc<WebhookState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "active_windows": state.debouncer.active_windows(),
        "executing": state.lock.is_busy(),
    }))
}

fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// Exchange symbols are `[A-Z0-9]+`; they end up in signed query strings
fn is_valid_symbol(symbol: &str) -> bool {
    !symbol.is_empty()
        && symbol
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
