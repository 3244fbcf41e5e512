//! Outbound notification queue

use tokio::sync::mpsc;

/// Default notification queue size
pub const DEFAULT_CHANNEL_SIZE: usize = 256;

pub type NotificationSender = mpsc::Sender<String>;
pub type NotificationReceiver = mpsc::Receiver<String>;

/// Queue with the default capacity
pub fn create_notification_channel() -> (NotificationSender, NotificationReceiver) {
    create_notification_channel_with_size(DEFAULT_CHANNEL_SIZE)
}

/// Queue with a configured capacity; zero is raised to one since tokio
/// rejects empty bounded channels
pub fn create_notification_channel_with_size(
    size: usize,
) -> (NotificationSender, NotificationReceiver) {
    mpsc::channel(size.max(1))
}
