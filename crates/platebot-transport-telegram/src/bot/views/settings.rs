//! Settings menus

use super::CB_MAIN_MENU;
use crate::bot::preferences::{Language, UserPreferences};
use platebot_core::vehicle::DisplayField;
use std::fmt::Write;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

/// Open the display field picker
pub const CB_SETTINGS_FIELDS: &str = "settings_fields";
/// Open the language picker
pub const CB_SETTINGS_LANGUAGE: &str = "settings_language";
/// Flip compact mode
pub const CB_SETTINGS_COMPACT: &str = "settings_compact";
/// Flip the "searching" notice
pub const CB_SETTINGS_NOTIFICATIONS: &str = "settings_notifications";
/// Restore defaults
pub const CB_SETTINGS_RESET: &str = "settings_reset";
/// Close the field picker
pub const CB_SAVE_FIELDS: &str = "save_fields";
/// Prefix of field toggle buttons
pub const CB_TOGGLE_FIELD_PREFIX: &str = "toggle_field_";
/// Prefix of language buttons
pub const CB_SET_LANGUAGE_PREFIX: &str = "set_language_";

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

/// Settings overview
#[must_use]
pub fn settings_text(prefs: &UserPreferences) -> String {
    let mut out = String::from("⚙️ <b>Settings</b>\n\n");
    let _ = writeln!(
        out,
        "📋 Fields shown: {} of {}",
        prefs.fields.len(),
        DisplayField::ALL.len()
    );
    let _ = writeln!(out, "🌐 Language: {}", prefs.language.display_name());
    let _ = writeln!(out, "📏 Compact results: {}", on_off(prefs.compact));
    let _ = write!(out, "🔔 Search notice: {}", on_off(prefs.notifications));
    out
}

/// Settings overview buttons
#[must_use]
pub fn settings_keyboard(prefs: &UserPreferences) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("📋 Fields", CB_SETTINGS_FIELDS)],
        vec![InlineKeyboardButton::callback("🌐 Language", CB_SETTINGS_LANGUAGE)],
        vec![
            InlineKeyboardButton::callback(
                format!("📏 Compact: {}", on_off(prefs.compact)),
                CB_SETTINGS_COMPACT,
            ),
            InlineKeyboardButton::callback(
                format!("🔔 Notice: {}", on_off(prefs.notifications)),
                CB_SETTINGS_NOTIFICATIONS,
            ),
        ],
        vec![
            InlineKeyboardButton::callback("♻️ Reset", CB_SETTINGS_RESET),
            InlineKeyboardButton::callback("🏠 Main menu", CB_MAIN_MENU),
        ],
    ])
}

/// Field picker header
#[must_use]
pub fn fields_text() -> &'static str {
    "📋 <b>Result fields</b>\n\nTap a field to show or hide it, then save."
}

/// One toggle button per field, two per row
#[must_use]
pub fn fields_keyboard(prefs: &UserPreferences) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = DisplayField::ALL
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|field| {
                    let mark = if prefs.shows(*field) { "✅" } else { "⬜" };
                    InlineKeyboardButton::callback(
                        format!("{mark} {}", field.label()),
                        format!("{CB_TOGGLE_FIELD_PREFIX}{}", field.as_str()),
                    )
                })
                .collect()
        })
        .collect();
    rows.push(vec![InlineKeyboardButton::callback("💾 Save", CB_SAVE_FIELDS)]);
    InlineKeyboardMarkup::new(rows)
}

/// Language picker header
#[must_use]
pub fn language_text(current: Language) -> String {
    format!(
        "🌐 <b>Language</b>\n\nCurrent: {}\n\nResults are shown in English; \
the choice is kept for when more translations are available.",
        current.display_name()
    )
}

/// One button per language
#[must_use]
pub fn language_keyboard(current: Language) -> InlineKeyboardMarkup {
    let row: Vec<InlineKeyboardButton> = Language::ALL
        .into_iter()
        .map(|lang| {
            let mark = if lang == current { "✅ " } else { "" };
            InlineKeyboardButton::callback(
                format!("{mark}{}", lang.display_name()),
                format!("{CB_SET_LANGUAGE_PREFIX}{}", lang.code()),
            )
        })
        .collect();
    InlineKeyboardMarkup::new(vec![row])
}

/// Callback answer after a field toggle
#[must_use]
pub fn field_toggled_text(field: DisplayField, shown: bool) -> String {
    if shown {
        format!("{} will be shown", field.label())
    } else {
        format!("{} will be hidden", field.label())
    }
}

/// Callback answer for an unknown field or language
#[must_use]
pub fn unknown_option_text() -> &'static str {
    "Unknown option"
}

/// Callback answer after the field picker is closed
#[must_use]
pub fn fields_saved_text() -> &'static str {
    "Fields saved"
}

/// Confirmation after settings were reset
#[must_use]
pub fn settings_reset_text() -> &'static str {
    "Settings restored to defaults"
}
