//! Ordered routing rule tables.
//!
//! Each table is evaluated top to bottom and the first matching rule wins.
//! Rules inside one table must be mutually exclusive; the tests at the bottom
//! of this file enforce that for every literal the tables contain.

use super::plate::{has_valid_length, is_plate_shape, normalize_plate};
use super::RouteAction;

/// How a rule recognizes its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    /// Bot command, optionally addressed as `/command@botname`
    Command(&'static str),
    /// Exact callback payload
    Exact(&'static str),
    /// Callback payload with a non-empty suffix after the prefix
    Prefix(&'static str),
    /// Plate-shaped text with 7-8 digits
    Plate,
    /// Plate-shaped text with any other digit count
    MalformedPlate,
}

/// What a successful match extracted from the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Captured<'a> {
    /// Nothing beyond the fact of the match
    Nothing,
    /// Verbatim suffix of a prefix rule
    Suffix(&'a str),
    /// Normalized plate digits
    Plate(String),
}

impl Matcher {
    /// Try to match `input`, returning what was captured.
    #[must_use]
    pub fn matches<'a>(&self, input: &'a str) -> Option<Captured<'a>> {
        match *self {
            Self::Command(command) => {
                let rest = input.strip_prefix(command)?;
                let addressed = rest
                    .strip_prefix('@')
                    .is_some_and(|bot| !bot.is_empty() && !bot.contains(char::is_whitespace));
                (rest.is_empty() || addressed).then_some(Captured::Nothing)
            }
            Self::Exact(literal) => (input == literal).then_some(Captured::Nothing),
            Self::Prefix(prefix) => input
                .strip_prefix(prefix)
                .filter(|suffix| !suffix.is_empty())
                .map(Captured::Suffix),
            Self::Plate => {
                if !is_plate_shape(input) {
                    return None;
                }
                let digits = normalize_plate(input);
                has_valid_length(&digits).then_some(Captured::Plate(digits))
            }
            Self::MalformedPlate => {
                if !is_plate_shape(input) {
                    return None;
                }
                (!has_valid_length(&normalize_plate(input))).then_some(Captured::Nothing)
            }
        }
    }
}

/// A (matcher, action) pair.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    /// Recognizer for the input
    pub matcher: Matcher,
    /// Action emitted on match
    pub action: RouteAction,
}

const fn rule(matcher: Matcher, action: RouteAction) -> Rule {
    Rule { matcher, action }
}

/// Rules for free-text messages, in priority order.
pub const TEXT_RULES: &[Rule] = &[
    rule(Matcher::Command("/start"), RouteAction::Start),
    rule(Matcher::Command("/help"), RouteAction::Help),
    rule(Matcher::Command("/settings"), RouteAction::Settings),
    rule(Matcher::Plate, RouteAction::PlateSearch),
    rule(Matcher::MalformedPlate, RouteAction::InvalidPlate),
];

/// Rules for callback payloads, in priority order.
pub const CALLBACK_RULES: &[Rule] = &[
    rule(Matcher::Exact("help"), RouteAction::HelpCallback),
    rule(Matcher::Exact("settings"), RouteAction::SettingsCallback),
    rule(Matcher::Exact("new_search"), RouteAction::NewSearch),
    rule(Matcher::Exact("main_menu"), RouteAction::MainMenu),
    rule(Matcher::Exact("cancel_search"), RouteAction::CancelSearch),
    rule(Matcher::Exact("retry_search"), RouteAction::RetrySearch),
    rule(Matcher::Exact("settings_fields"), RouteAction::FieldsSettings),
    rule(Matcher::Exact("settings_language"), RouteAction::LanguageSettings),
    rule(Matcher::Exact("settings_compact"), RouteAction::CompactSettings),
    rule(
        Matcher::Exact("settings_notifications"),
        RouteAction::NotificationsSettings,
    ),
    rule(Matcher::Exact("settings_reset"), RouteAction::ResetSettings),
    rule(Matcher::Prefix("toggle_field_"), RouteAction::ToggleField),
    rule(Matcher::Exact("save_fields"), RouteAction::SaveFields),
    rule(Matcher::Prefix("set_language_"), RouteAction::SetLanguage),
];

/// Evaluate `rules` in order and return the first match.
#[must_use]
pub fn first_match<'a>(rules: &[Rule], input: &'a str) -> Option<(RouteAction, Captured<'a>)> {
    rules
        .iter()
        .find_map(|r| r.matcher.matches(input).map(|captured| (r.action, captured)))
}
