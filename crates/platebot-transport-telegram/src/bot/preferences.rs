//! Per-user display preferences
//!
//! Kept in memory only; entries expire after a period of inactivity and a
//! restart brings everyone back to the defaults.

use moka::future::Cache;
use platebot_core::vehicle::DisplayField;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Interface language a user picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    /// `he`
    #[default]
    Hebrew,
    /// `en`
    English,
}

impl Language {
    /// Every selectable language
    pub const ALL: [Self; 2] = [Self::Hebrew, Self::English];

    /// Code used in `set_language_<code>`
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Hebrew => "he",
            Self::English => "en",
        }
    }

    /// Name shown on buttons
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Hebrew => "עברית",
            Self::English => "English",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|l| l.code() == s)
            .ok_or_else(|| format!("unsupported language: {s}"))
    }
}

/// Display preferences of one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPreferences {
    /// Fields shown in search results
    pub fields: BTreeSet<DisplayField>,
    /// Preferred language
    pub language: Language,
    /// One-line results
    pub compact: bool,
    /// Send a "searching" message before the result
    pub notifications: bool,
    /// Most recent plate searched, for the retry button
    pub last_plate: Option<String>,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            fields: DisplayField::ALL
                .into_iter()
                .filter(|f| f.enabled_by_default())
                .collect(),
            language: Language::default(),
            compact: false,
            notifications: true,
            last_plate: None,
        }
    }
}

impl UserPreferences {
    /// Returns `true` if `field` is shown
    #[must_use]
    pub fn shows(&self, field: DisplayField) -> bool {
        self.fields.contains(&field)
    }

    /// Flip `field` and return whether it is now shown
    pub fn toggle(&mut self, field: DisplayField) -> bool {
        if self.fields.remove(&field) {
            false
        } else {
            self.fields.insert(field);
            true
        }
    }
}

/// In-memory preference store keyed by user id.
#[derive(Clone)]
pub struct PreferencesStore {
    cache: Cache<i64, UserPreferences>,
}

impl PreferencesStore {
    /// Create a store whose entries live for `idle_secs` since last access
    #[must_use]
    pub fn new(idle_secs: u64, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_idle(Duration::from_secs(idle_secs))
            .build();
        Self { cache }
    }

    /// Preferences of `user_id`, defaults when none are stored
    pub async fn get(&self, user_id: i64) -> UserPreferences {
        self.cache.get(&user_id).await.unwrap_or_default()
    }

    /// Apply `change` to the preferences of `user_id` and return the result.
    ///
    /// The read-modify-write is atomic per user.
    pub async fn update<F>(&self, user_id: i64, change: F) -> UserPreferences
    where
        F: FnOnce(&mut UserPreferences) + Send,
    {
        self.cache
            .entry(user_id)
            .and_upsert_with(|current| {
                let mut prefs = current.map(moka::Entry::into_value).unwrap_or_default();
                change(&mut prefs);
                std::future::ready(prefs)
            })
            .await
            .into_value()
    }

    /// Forget everything stored for `user_id`
    pub async fn reset(&self, user_id: i64) {
        self.cache.invalidate(&user_id).await;
        debug!(user_id, "Preferences reset");
    }

    /// Users with stored preferences
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_hide_optional_fields() {
        let prefs = UserPreferences::default();
        assert!(prefs.shows(DisplayField::Manufacturer));
        assert!(prefs.shows(DisplayField::DisabilityPermit));
        assert!(!prefs.shows(DisplayField::VehicleType));
        assert!(!prefs.shows(DisplayField::FirstRegistration));
        assert!(prefs.notifications);
        assert!(!prefs.compact);
    }

    #[test]
    fn test_toggle_flips() {
        let mut prefs = UserPreferences::default();
        assert!(!prefs.toggle(DisplayField::Color));
        assert!(!prefs.shows(DisplayField::Color));
        assert!(prefs.toggle(DisplayField::Color));
        assert!(prefs.shows(DisplayField::Color));
    }

    #[test]
    fn test_language_codes() {
        assert_eq!("en".parse::<Language>(), Ok(Language::English));
        assert_eq!("he".parse::<Language>(), Ok(Language::Hebrew));
        assert!("fr".parse::<Language>().is_err());
    }

    #[tokio::test]
    async fn test_update_persists_and_reset_restores_defaults() {
        let store = PreferencesStore::new(60, 100);

        let updated = store.update(7, |p| p.compact = true).await;
        assert!(updated.compact);
        assert!(store.get(7).await.compact);
        assert_eq!(store.get(8).await, UserPreferences::default());

        store.reset(7).await;
        assert_eq!(store.get(7).await, UserPreferences::default());
    }
}
