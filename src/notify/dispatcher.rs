//! Non-blocking notification fan-out
//!
//! The trading core only ever calls [`NotificationDispatcher::notify`],
//! which enqueues and returns. A background task owns the concrete
//! [`Notifier`] and swallows delivery failures after logging them.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::common::channels::create_notification_channel_with_size;
use crate::common::errors::Result;
use crate::common::traits::Notifier;

/// Notifier that only writes to the log
///
/// Used when no chat webhook is configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        info!(target: "notification", "{}", message);
        Ok(())
    }
}

/// Cloneable handle for fire-and-forget notifications
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    sender: mpsc::Sender<String>,
}

impl NotificationDispatcher {
    /// Spawn the delivery task and return the handle plus its join handle
    ///
    /// The task ends once every dispatcher clone has been dropped and the
    /// queue is drained.
    pub fn spawn(notifier: Arc<dyn Notifier>, queue_size: usize) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = create_notification_channel_with_size(queue_size);
        let handle = tokio::spawn(deliver(notifier, receiver));
        (Self { sender }, handle)
    }

    /// Build a dispatcher around an existing channel sender
    pub fn from_sender(sender: mpsc::Sender<String>) -> Self {
        Self { sender }
    }

    /// Enqueue a message without waiting for delivery
    pub fn notify(&self, message: impl Into<String>) {
        let message = message.into();
        match self.sender.try_send(message) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(message)) => {
                warn!("Notification queue full, dropping: {}", message);
            }
            Err(mpsc::error::TrySendError::Closed(message)) => {
                warn!("Notification queue closed, dropping: {}", message);
            }
        }
    }
}

async fn deliver(notifier: Arc<dyn Notifier>, mut receiver: mpsc::Receiver<String>) {
    while let Some(message) = receiver.recv().await {
        if let Err(e) = notifier.send(&message).await {
            error!("Failed to deliver notification: {}", e);
        }
    }
    info!("Notification channel closed. Stopping delivery task.");
}
