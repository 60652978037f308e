//! License plate shape detection and normalization.

// lazy_regex! uses once_cell internally and validates patterns at compile time
#![allow(clippy::non_std_lazy_statics)]

use lazy_regex::lazy_regex;
use thiserror::Error;

/// Text made only of digits and the separators space, `-` and `.`
static RE_PLATE_SHAPE: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"^[0-9 \-.]{1,11}$");

/// Minimum digit count of an Israeli license plate
pub const PLATE_MIN_DIGITS: usize = 7;
/// Maximum digit count of an Israeli license plate
pub const PLATE_MAX_DIGITS: usize = 8;

/// Reasons a raw plate string cannot be used as a lookup key
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlateError {
    /// Nothing left after trimming
    #[error("license plate is empty")]
    Empty,
    /// Contains characters other than digits and separators
    #[error("invalid license plate format: {0}")]
    InvalidFormat(String),
    /// Digit count outside the accepted range
    #[error("license plate must contain 7-8 digits, got {0}")]
    InvalidLength(usize),
}

/// Returns `true` when the text looks like an attempt to enter a plate.
///
/// The check is deliberately loose: digit count is not validated here so that
/// `"123"` can still be reported as an invalid plate rather than free text.
#[must_use]
pub fn is_plate_shape(text: &str) -> bool {
    let text = text.trim();
    RE_PLATE_SHAPE.is_match(text) && text.bytes().any(|b| b.is_ascii_digit())
}

/// Strip separators and keep ASCII digits only.
///
/// ```
/// use platebot_core::router::plate::normalize_plate;
/// assert_eq!(normalize_plate("123-45-678"), "12345678");
/// assert_eq!(normalize_plate(" 12.345 67 "), "1234567");
/// ```
#[must_use]
pub fn normalize_plate(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Returns `true` when the digit count is within 7-8.
#[must_use]
pub fn has_valid_length(digits: &str) -> bool {
    (PLATE_MIN_DIGITS..=PLATE_MAX_DIGITS).contains(&digits.len())
}

/// Validate a raw plate and return its normalized digits.
///
/// # Errors
///
/// Returns a [`PlateError`] when the input is empty, has the wrong shape or
/// the wrong number of digits.
pub fn validate_plate(raw: &str) -> Result<String, PlateError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PlateError::Empty);
    }
    if !is_plate_shape(trimmed) {
        return Err(PlateError::InvalidFormat(trimmed.to_string()));
    }

    let digits = normalize_plate(trimmed);
    if !has_valid_length(&digits) {
        return Err(PlateError::InvalidLength(digits.len()));
    }
    Ok(digits)
}
