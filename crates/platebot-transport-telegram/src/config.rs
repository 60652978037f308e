//! Telegram transport settings.

use config::ConfigError;
use platebot_core::config::PipelineSettings;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Telegram transport settings loaded from environment variables.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct TelegramSettings {
    /// Telegram Bot API token.
    #[serde(default)]
    pub telegram_bot_token: String,
}

/// Combined settings used by the Telegram transport layer.
#[derive(Debug, Clone)]
pub struct BotSettings {
    /// Search pipeline settings shared across transport handlers.
    pub pipeline: Arc<PipelineSettings>,
    /// Telegram-specific settings.
    pub telegram: Arc<TelegramSettings>,
}

impl BotSettings {
    /// Create a new combined settings bundle.
    #[must_use]
    pub fn new(pipeline: PipelineSettings, telegram: TelegramSettings) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            telegram: Arc::new(telegram),
        }
    }
}

impl TelegramSettings {
    /// Create new settings by loading from environment and files.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        platebot_core::config::build_config()?.try_deserialize()
    }

    /// Returns `true` when a bot token is configured
    #[must_use]
    pub fn has_token(&self) -> bool {
        !self.telegram_bot_token.trim().is_empty()
    }
}

/// Cooldown period (seconds) between "too many requests" notices for the same user.
pub const THROTTLE_NOTICE_COOLDOWN_SECS: u64 = 30;
/// Maximum number of users tracked by the throttle notice cache.
pub const THROTTLE_NOTICE_CACHE_MAX_SIZE: u64 = 10_000;
/// Time-to-live (seconds) of user preferences kept in memory.
/// Default: 7 days.
pub const PREFERENCES_TTL_SECS: u64 = 604_800;
/// Maximum number of users whose preferences are kept in memory.
pub const PREFERENCES_MAX_SIZE: u64 = 50_000;

/// Get throttle notice cooldown from env or default.
///
/// Environment variable: `THROTTLE_NOTICE_COOLDOWN_SECS`.
#[must_use]
pub fn get_throttle_notice_cooldown() -> u64 {
    std::env::var("THROTTLE_NOTICE_COOLDOWN_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(THROTTLE_NOTICE_COOLDOWN_SECS)
}

/// Get throttle notice cache max size from env or default.
///
/// Environment variable: `THROTTLE_NOTICE_CACHE_MAX_SIZE`.
#[must_use]
pub fn get_throttle_notice_cache_max_size() -> u64 {
    std::env::var("THROTTLE_NOTICE_CACHE_MAX_SIZE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(THROTTLE_NOTICE_CACHE_MAX_SIZE)
}

/// Get preferences TTL from env or default.
///
/// Environment variable: `PREFERENCES_TTL_SECS`.
#[must_use]
pub fn get_preferences_ttl() -> u64 {
    std::env::var("PREFERENCES_TTL_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(PREFERENCES_TTL_SECS)
}

/// Get preferences cache max size from env or default.
///
/// Environment variable: `PREFERENCES_MAX_SIZE`.
#[must_use]
pub fn get_preferences_max_size() -> u64 {
    std::env::var("PREFERENCES_MAX_SIZE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(PREFERENCES_MAX_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_token() {
        let mut settings = TelegramSettings::default();
        assert!(!settings.has_token());

        settings.telegram_bot_token = "   ".to_string();
        assert!(!settings.has_token());

        settings.telegram_bot_token = "123:abc".to_string();
        assert!(settings.has_token());
    }

    #[test]
    fn test_defaults_without_env() {
        // Variables with these names are never set by the test harness
        assert_eq!(get_throttle_notice_cache_max_size(), THROTTLE_NOTICE_CACHE_MAX_SIZE);
        assert_eq!(get_preferences_max_size(), PREFERENCES_MAX_SIZE);
    }
}
