// Telegram layer - transport adapter: polling, admin commands and
// outbound status notifications.

#[path = "admin.rs"]
pub mod admin;

#[path = "api.rs"]
pub mod api;

#[path = "listener.rs"]
pub mod listener;

#[path = "notifier.rs"]
pub mod notifier;
