//! View layer for bot UI components
//!
//! Texts are HTML; anything coming from users or the registry goes through
//! [`escape`] first.

pub mod search;
pub mod settings;

pub use search::*;
pub use settings::*;

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

// ─────────────────────────────────────────────────────────────────────────────
// Callback data
// ─────────────────────────────────────────────────────────────────────────────

/// Open the help screen
pub const CB_HELP: &str = "help";
/// Open the settings menu
pub const CB_SETTINGS: &str = "settings";
/// Prompt for a new plate
pub const CB_NEW_SEARCH: &str = "new_search";
/// Back to the main menu
pub const CB_MAIN_MENU: &str = "main_menu";
/// Dismiss a pending search
pub const CB_CANCEL_SEARCH: &str = "cancel_search";
/// Repeat the last search
pub const CB_RETRY_SEARCH: &str = "retry_search";

/// HTML-escape user or registry text
#[must_use]
pub fn escape(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}

/// Welcome text for `/start` and the main menu
#[must_use]
pub fn welcome_text() -> &'static str {
    "🚗 <b>Vehicle lookup</b>\n\n\
Send an Israeli license plate number (7 or 8 digits) and I will look it up \
in the government vehicle registry.\n\n\
Examples: <code>1234567</code>, <code>12-345-678</code>"
}

/// Main menu buttons
#[must_use]
pub fn main_menu_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("🔍 New search", CB_NEW_SEARCH)],
        vec![
            InlineKeyboardButton::callback("⚙️ Settings", CB_SETTINGS),
            InlineKeyboardButton::callback("❓ Help", CB_HELP),
        ],
    ])
}

/// Help text for `/help`
#[must_use]
pub fn help_text() -> &'static str {
    "❓ <b>Help</b>\n\n\
<b>Searching</b>\n\
Send a plate number with 7 or 8 digits. Spaces, dashes and dots are ignored.\n\n\
<b>Commands</b>\n\
/start - main menu\n\
/help - this message\n\
/settings - choose which details are shown\n\n\
Data comes from the public vehicle registry at data.gov.il and may lag \
behind recent changes."
}

/// Single "main menu" button
#[must_use]
pub fn back_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "🏠 Main menu",
        CB_MAIN_MENU,
    )]])
}

/// Prompt shown after "new search"
#[must_use]
pub fn new_search_prompt() -> &'static str {
    "🔍 Send the license plate number you want to look up."
}

/// Text for free text that is neither a command nor a plate
#[must_use]
pub fn unrecognized_text() -> &'static str {
    "🤔 I did not understand that.\n\nSend a plate number (7 or 8 digits) or /help."
}

/// Text for messages without text (stickers, photos...)
#[must_use]
pub fn unsupported_text() -> &'static str {
    "📎 I can only read text messages. Send a plate number as text."
}

/// Answer for a button this version does not know
#[must_use]
pub fn unknown_button_text() -> &'static str {
    "This button is no longer supported."
}

/// Text for an internal routing fault
#[must_use]
pub fn internal_error_text() -> &'static str {
    "⚠️ Something went wrong while handling your message. Please try again."
}

/// Text for a request rejected by admission control.
///
/// ```
/// use platebot_transport_telegram::bot::views::rate_limited_text;
/// assert!(rate_limited_text(75).contains("1 min 15 sec"));
/// assert!(rate_limited_text(120).contains("2 min"));
/// assert!(rate_limited_text(9).contains("9 sec"));
/// ```
#[must_use]
pub fn rate_limited_text(retry_after_secs: u64) -> String {
    format!(
        "⏳ <b>Too many requests</b>\n\nPlease wait {} before searching again.",
        format_wait(retry_after_secs)
    )
}

fn format_wait(secs: u64) -> String {
    let secs = secs.max(1);
    match (secs / 60, secs % 60) {
        (0, s) => format!("{s} sec"),
        (m, 0) => format!("{m} min"),
        (m, s) => format!("{m} min {s} sec"),
    }
}
