//! Server module - Inbound HTTP surface

pub mod webhook;

pub use webhook::{router, WebhookPayload, WebhookResponse, WebhookState};
