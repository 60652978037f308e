/// Conversion of Telegram updates into inbound events
pub mod events;
/// Message and callback handlers
pub mod handlers;
/// Per-user display preferences
pub mod preferences;
/// Resilient messaging with automatic retry for Telegram API operations
pub mod resilient;
/// Flood protection for "too many requests" notices
pub mod throttle_notice;
/// View layer for UI components (keyboards, messages)
pub mod views;

pub use handlers::BotContext;
pub use preferences::PreferencesStore;
pub use throttle_notice::ThrottleNoticeCache;
