//! Search progress and result rendering

use super::{
    escape, CB_CANCEL_SEARCH, CB_HELP, CB_MAIN_MENU, CB_NEW_SEARCH, CB_RETRY_SEARCH,
};
use crate::bot::preferences::UserPreferences;
use platebot_core::lookup::SearchOutcome;
use platebot_core::router::plate::PlateError;
use platebot_core::upstream::classify::ErrorKind;
use platebot_core::vehicle::{DisplayField, VehicleRecord};
use std::fmt::Write;
use std::time::Duration;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

/// Group plate digits the way they appear on the plate.
///
/// ```
/// use platebot_transport_telegram::bot::views::format_plate;
/// assert_eq!(format_plate("1234567"), "12-345-67");
/// assert_eq!(format_plate("12345678"), "123-45-678");
/// assert_eq!(format_plate("123"), "123");
/// ```
#[must_use]
pub fn format_plate(plate: &str) -> String {
    if !plate.bytes().all(|b| b.is_ascii_digit()) {
        return plate.to_string();
    }
    match plate.len() {
        7 => format!("{}-{}-{}", &plate[..2], &plate[2..5], &plate[5..]),
        8 => format!("{}-{}-{}", &plate[..3], &plate[3..5], &plate[5..]),
        _ => plate.to_string(),
    }
}

/// Progress message while the registry is queried
#[must_use]
pub fn searching_text(plate: &str) -> String {
    format!(
        "🔍 Searching for <code>{}</code>...",
        escape(&format_plate(plate))
    )
}

/// Keyboard under the "send a plate" prompt
#[must_use]
pub fn cancel_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "✖️ Cancel",
        CB_CANCEL_SEARCH,
    )]])
}

/// Keyboard under a finished search
#[must_use]
pub fn result_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("🔍 New search", CB_NEW_SEARCH),
        InlineKeyboardButton::callback("❓ Help", CB_HELP),
    ]])
}

/// Keyboard under a failed search
#[must_use]
pub fn failure_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("🔄 Try again", CB_RETRY_SEARCH),
        InlineKeyboardButton::callback("🏠 Main menu", CB_MAIN_MENU),
    ]])
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

/// Render a found vehicle with the fields `prefs` selects.
#[must_use]
pub fn vehicle_text(
    vehicle: &VehicleRecord,
    disability_permit: bool,
    elapsed: Duration,
    prefs: &UserPreferences,
) -> String {
    let plate = escape(&format_plate(&vehicle.license_plate));
    let mut out = format!("🚗 <b>{}</b>\n", escape(&vehicle.title()));

    if prefs.compact {
        let _ = write!(out, "🔢 <code>{plate}</code>");
        if prefs.shows(DisplayField::TestDate) {
            if let Some(test) = vehicle.display_value(DisplayField::TestDate) {
                let _ = write!(out, " · test {}", escape(&test));
            }
        }
        if prefs.shows(DisplayField::DisabilityPermit) && disability_permit {
            out.push_str(" · ♿");
        }
        return out;
    }

    let _ = writeln!(out, "🔢 Plate: <code>{plate}</code>\n");
    for field in DisplayField::ALL {
        if !prefs.shows(field) {
            continue;
        }
        let value = match field {
            DisplayField::DisabilityPermit => Some(yes_no(disability_permit).to_string()),
            other => vehicle.display_value(other),
        };
        if let Some(value) = value {
            let _ = writeln!(out, "• {}: {}", field.label(), escape(&value));
        }
    }
    let _ = write!(out, "\n<i>⏱ {:.1}s</i>", elapsed.as_secs_f64());
    out
}

/// Text when the registry has no such plate
#[must_use]
pub fn not_found_text(plate: &str) -> String {
    format!(
        "🔍 No vehicle found with plate <code>{}</code>.\n\nCheck the number and try again.",
        escape(&format_plate(plate))
    )
}

/// Text when the same search is already running
#[must_use]
pub fn in_progress_text(plate: &str) -> String {
    format!(
        "⏳ A search for <code>{}</code> is already running. Please wait for it to finish.",
        escape(&format_plate(plate))
    )
}

/// Text for plate-shaped input with the wrong number of digits
#[must_use]
pub fn invalid_plate_text(input: &str) -> String {
    format!(
        "❌ <code>{}</code> is not a valid plate number.\n\nIsraeli plates have 7 or 8 digits.",
        escape(input)
    )
}

/// Text for a plate rejected by validation inside the pipeline
#[must_use]
pub fn plate_error_text(error: &PlateError) -> String {
    match error {
        PlateError::Empty => "❌ Please send a plate number.".to_string(),
        PlateError::InvalidFormat(input) => invalid_plate_text(input),
        PlateError::InvalidLength(digits) => {
            format!("❌ The number has {digits} digits.\n\nIsraeli plates have 7 or 8 digits.")
        }
    }
}

/// User-facing text for a failed search
#[must_use]
pub fn failure_text(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::TransientNetwork => {
            "🌐 The vehicle registry cannot be reached right now. Please try again in a minute."
        }
        ErrorKind::TransientUpstream => {
            "⚠️ The vehicle registry is busy. Please try again shortly."
        }
        ErrorKind::PermanentInput => "❌ The registry rejected this request. Check the plate number.",
        ErrorKind::PermanentUpstream => {
            "⚠️ The vehicle registry returned an unexpected response. Please try again later."
        }
        ErrorKind::Unknown => "⚠️ Something went wrong during the search. Please try again.",
    }
}

/// Text after the user dismissed a search
#[must_use]
pub fn cancelled_text() -> &'static str {
    "✖️ Search dismissed."
}

/// Text and keyboard for a finished search
#[must_use]
pub fn outcome_view(outcome: &SearchOutcome, prefs: &UserPreferences) -> (String, InlineKeyboardMarkup) {
    match outcome {
        SearchOutcome::Found {
            vehicle,
            disability_permit,
            elapsed,
        } => (
            vehicle_text(vehicle, *disability_permit, *elapsed, prefs),
            result_keyboard(),
        ),
        SearchOutcome::NotFound { plate } => (not_found_text(plate), result_keyboard()),
        SearchOutcome::AlreadyInProgress { plate } => (in_progress_text(plate), result_keyboard()),
        SearchOutcome::InvalidInput(e) => (plate_error_text(e), result_keyboard()),
        SearchOutcome::Failed(e) => (failure_text(e.settled_kind()).to_string(), failure_keyboard()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platebot_core::upstream::classify::classify;
    use platebot_core::upstream::{FetchError, FetchFault};

    fn corolla() -> VehicleRecord {
        VehicleRecord {
            license_plate: "12345678".to_string(),
            manufacturer: Some("Toyota".to_string()),
            model: Some("COROLLA".to_string()),
            year: Some("2019".to_string()),
            color: Some("<white>".to_string()),
            test_valid_until: Some("2025-03-09".to_string()),
            vehicle_type: Some("P".to_string()),
            ..VehicleRecord::default()
        }
    }

    #[test]
    fn test_full_view_respects_field_selection() {
        let text = vehicle_text(
            &corolla(),
            true,
            Duration::from_millis(420),
            &UserPreferences::default(),
        );
        assert!(text.contains("Toyota COROLLA 2019"));
        assert!(text.contains("<code>123-45-678</code>"));
        assert!(text.contains("• Color: &lt;white&gt;"));
        assert!(text.contains("• Test valid until: 09/03/2025"));
        assert!(text.contains("• Disability permit: Yes"));
        // Hidden by default
        assert!(!text.contains("Vehicle type"));
        // Missing values are skipped, not printed empty
        assert!(!text.contains("Fuel"));
        assert!(text.contains("0.4s"));
    }

    #[test]
    fn test_compact_view() {
        let prefs = UserPreferences {
            compact: true,
            ..UserPreferences::default()
        };
        let text = vehicle_text(&corolla(), false, Duration::ZERO, &prefs);
        assert!(text.contains("test 09/03/2025"));
        assert!(!text.contains('♿'));
        assert!(!text.contains("• "));
    }

    #[test]
    fn test_failure_uses_settled_kind() {
        let fault = FetchFault::InvalidResponse("success=false".to_string());
        let outcome = SearchOutcome::Failed(FetchError {
            classification: classify(&fault),
            fault,
            attempts: 3,
            retries_exhausted: true,
        });
        let (text, keyboard) = outcome_view(&outcome, &UserPreferences::default());
        assert_eq!(text, failure_text(ErrorKind::PermanentUpstream));
        assert_eq!(keyboard, failure_keyboard());
    }

    #[test]
    fn test_not_found_formats_plate() {
        let (text, _) = outcome_view(
            &SearchOutcome::NotFound {
                plate: "1234567".to_string(),
            },
            &UserPreferences::default(),
        );
        assert!(text.contains("12-345-67"));
    }
}
