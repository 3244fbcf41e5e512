//! Notify module - Outbound chat notifications

pub mod discord;
pub mod dispatcher;

pub use discord::DiscordNotifier;
pub use dispatcher::{LogNotifier, NotificationDispatcher};
