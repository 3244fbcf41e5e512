//! Discord webhook notifier

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::common::errors::{Result, TradeError};
use crate::common::traits::Notifier;
use crate::config::types::DiscordConfig;

/// Discord caps message content at 2000 characters
const MAX_CONTENT_CHARS: usize = 2000;

/// Posts notifications to a Discord channel webhook
#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    client: Client,
    webhook_url: String,
    username: Option<String>,
}

impl DiscordNotifier {
    /// Create a notifier for a webhook URL
    pub fn new(webhook_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(webhook_url, Duration::from_secs(10))
    }

    /// Create a notifier with a custom request timeout
    pub fn with_timeout(webhook_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TradeError::Internal(e.to_string()))?;

        Ok(Self {
            client,
            webhook_url: webhook_url.into(),
            username: None,
        })
    }

    /// Create a notifier from configuration, if a webhook URL is set
    pub fn from_config(config: &DiscordConfig, timeout: Duration) -> Result<Option<Self>> {
        match &config.webhook_url {
            Some(url) => {
                let mut notifier = Self::with_timeout(url.clone(), timeout)?;
                notifier.username = config.username.clone();
                Ok(Some(notifier))
            }
            None => Ok(None),
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    #[instrument(skip(self, message))]
    async fn send(&self, message: &str) -> Result<()> {
        let content: String = message.chars().take(MAX_CONTENT_CHARS).collect();
        let mut payload = json!({ "content": content });
        if let Some(ref username) = self.username {
            payload["username"] = json!(username);
        }

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TradeError::Notification(format!(
                "Discord returned status {}: {}",
                status, body
            )));
        }

        debug!("Discord notification delivered");
        Ok(())
    }
}
