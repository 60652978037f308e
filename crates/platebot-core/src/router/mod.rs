//! Inbound event router
//!
//! Maps one inbound event (free text or a callback payload) to exactly one
//! [`RoutingResult`]. Routing is a pure function of the event and never
//! panics out: an internal fault becomes a [`RouteAction::RoutingError`]
//! result carrying enough context for the caller to log it.

pub mod plate;
pub mod rules;

use rules::{first_match, Captured, CALLBACK_RULES, TEXT_RULES};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Payload keys used by routing results.
pub mod keys {
    /// Sender (Telegram user) id
    pub const USER_ID: &str = "user_id";
    /// Chat id
    pub const CHAT_ID: &str = "chat_id";
    /// Id of the message the event belongs to
    pub const MESSAGE_ID: &str = "message_id";
    /// Callback query id to answer
    pub const CALLBACK_QUERY_ID: &str = "callback_query_id";
    /// Normalized plate digits
    pub const LICENSE_PLATE: &str = "license_plate";
    /// Trimmed text the plate was parsed from
    pub const ORIGINAL_TEXT: &str = "original_text";
    /// Plate-shaped text with the wrong digit count
    pub const INVALID_INPUT: &str = "invalid_input";
    /// Unrecognized free text
    pub const TEXT: &str = "text";
    /// Unrecognized callback payload
    pub const CALLBACK_DATA: &str = "callback_data";
    /// Display field captured from `toggle_field_<name>`
    pub const FIELD_NAME: &str = "field_name";
    /// Language code captured from `set_language_<code>`
    pub const LANGUAGE: &str = "language";
    /// Kind of the inbound event
    pub const EVENT_KIND: &str = "event_kind";
    /// Description of a routing fault
    pub const ERROR: &str = "error";
}

/// Kind of an inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Free-text message
    Text,
    /// Inline button press
    Callback,
    /// Anything else (photos, stickers, ...)
    Unsupported,
}

impl EventKind {
    /// Stable lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Callback => "callback",
            Self::Unsupported => "unsupported",
        }
    }
}

/// One inbound event from the messaging platform.
///
/// Identifiers are taken verbatim; validating them is the caller's business.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Text message
    Text {
        /// Message text
        text: String,
        /// Sender id
        sender_id: i64,
        /// Chat id
        chat_id: i64,
        /// Message id
        message_id: i32,
    },
    /// Callback query from an inline keyboard
    Callback {
        /// Callback payload
        data: String,
        /// Sender id
        sender_id: i64,
        /// Chat id of the message carrying the keyboard
        chat_id: i64,
        /// Id of the message carrying the keyboard
        message_id: i32,
        /// Callback query id
        callback_id: String,
    },
    /// Message without text or callback payload
    Unsupported {
        /// Sender id
        sender_id: i64,
        /// Chat id
        chat_id: i64,
        /// Message id
        message_id: i32,
    },
}

impl InboundEvent {
    /// Kind of this event
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Text { .. } => EventKind::Text,
            Self::Callback { .. } => EventKind::Callback,
            Self::Unsupported { .. } => EventKind::Unsupported,
        }
    }

    /// Sender id of this event
    #[must_use]
    pub const fn sender_id(&self) -> i64 {
        match self {
            Self::Text { sender_id, .. }
            | Self::Callback { sender_id, .. }
            | Self::Unsupported { sender_id, .. } => *sender_id,
        }
    }

    /// Chat id of this event
    #[must_use]
    pub const fn chat_id(&self) -> i64 {
        match self {
            Self::Text { chat_id, .. }
            | Self::Callback { chat_id, .. }
            | Self::Unsupported { chat_id, .. } => *chat_id,
        }
    }
}

/// Coarse grouping of routing results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RouteCategory {
    /// Bot command
    Command,
    /// Valid plate lookup
    LicensePlateSearch,
    /// Plate-shaped text with the wrong digit count
    InvalidLicensePlate,
    /// Navigation callback
    Callback,
    /// Settings screen callback
    Settings,
    /// Display field toggle
    FieldToggle,
    /// Display field save
    FieldSave,
    /// Language change
    LanguageSet,
    /// Free text nobody understands
    UnrecognizedText,
    /// Callback payload nobody understands
    UnrecognizedCallback,
    /// Event kind the bot does not handle
    Unsupported,
    /// Routing itself failed
    Error,
}

/// Closed set of actions; each maps to one handler entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteAction {
    /// `/start`
    Start,
    /// `/help`
    Help,
    /// `/settings`
    Settings,
    /// Look up a plate
    PlateSearch,
    /// Report an invalid plate
    InvalidPlate,
    /// `help` button
    HelpCallback,
    /// `settings` button
    SettingsCallback,
    /// `new_search` button
    NewSearch,
    /// `main_menu` button
    MainMenu,
    /// `cancel_search` button
    CancelSearch,
    /// `retry_search` button
    RetrySearch,
    /// `settings_fields` button
    FieldsSettings,
    /// `settings_language` button
    LanguageSettings,
    /// `settings_compact` button
    CompactSettings,
    /// `settings_notifications` button
    NotificationsSettings,
    /// `settings_reset` button
    ResetSettings,
    /// `toggle_field_<name>` button
    ToggleField,
    /// `save_fields` button
    SaveFields,
    /// `set_language_<code>` button
    SetLanguage,
    /// Fallback for free text
    UnrecognizedText,
    /// Fallback for callback payloads
    UnrecognizedCallback,
    /// Fallback for other event kinds
    Unsupported,
    /// Routing fault
    RoutingError,
}

const COMMAND_KEYS: &[&str] = &[keys::USER_ID, keys::CHAT_ID];
const CALLBACK_KEYS: &[&str] = &[
    keys::USER_ID,
    keys::CHAT_ID,
    keys::MESSAGE_ID,
    keys::CALLBACK_QUERY_ID,
];

impl RouteAction {
    /// Category this action belongs to
    #[must_use]
    pub const fn category(self) -> RouteCategory {
        match self {
            Self::Start | Self::Help | Self::Settings => RouteCategory::Command,
            Self::PlateSearch => RouteCategory::LicensePlateSearch,
            Self::InvalidPlate => RouteCategory::InvalidLicensePlate,
            Self::HelpCallback
            | Self::SettingsCallback
            | Self::NewSearch
            | Self::MainMenu
            | Self::CancelSearch
            | Self::RetrySearch => RouteCategory::Callback,
            Self::FieldsSettings
            | Self::LanguageSettings
            | Self::CompactSettings
            | Self::NotificationsSettings
            | Self::ResetSettings => RouteCategory::Settings,
            Self::ToggleField => RouteCategory::FieldToggle,
            Self::SaveFields => RouteCategory::FieldSave,
            Self::SetLanguage => RouteCategory::LanguageSet,
            Self::UnrecognizedText => RouteCategory::UnrecognizedText,
            Self::UnrecognizedCallback => RouteCategory::UnrecognizedCallback,
            Self::Unsupported => RouteCategory::Unsupported,
            Self::RoutingError => RouteCategory::Error,
        }
    }

    /// Payload keys the handler for this action relies on
    #[must_use]
    pub const fn required_keys(self) -> &'static [&'static str] {
        match self {
            Self::Start | Self::Help | Self::Settings => COMMAND_KEYS,
            Self::PlateSearch => &[
                keys::LICENSE_PLATE,
                keys::ORIGINAL_TEXT,
                keys::USER_ID,
                keys::CHAT_ID,
                keys::MESSAGE_ID,
            ],
            Self::InvalidPlate => &[keys::INVALID_INPUT, keys::USER_ID, keys::CHAT_ID],
            Self::UnrecognizedText => &[keys::TEXT, keys::USER_ID, keys::CHAT_ID],
            Self::HelpCallback
            | Self::SettingsCallback
            | Self::NewSearch
            | Self::MainMenu
            | Self::CancelSearch
            | Self::RetrySearch
            | Self::FieldsSettings
            | Self::LanguageSettings
            | Self::CompactSettings
            | Self::NotificationsSettings
            | Self::ResetSettings
            | Self::SaveFields => CALLBACK_KEYS,
            Self::ToggleField => &[
                keys::FIELD_NAME,
                keys::USER_ID,
                keys::CHAT_ID,
                keys::MESSAGE_ID,
                keys::CALLBACK_QUERY_ID,
            ],
            Self::SetLanguage => &[
                keys::LANGUAGE,
                keys::USER_ID,
                keys::CHAT_ID,
                keys::MESSAGE_ID,
                keys::CALLBACK_QUERY_ID,
            ],
            Self::UnrecognizedCallback => &[
                keys::CALLBACK_DATA,
                keys::USER_ID,
                keys::CHAT_ID,
                keys::MESSAGE_ID,
                keys::CALLBACK_QUERY_ID,
            ],
            Self::Unsupported => &[keys::EVENT_KIND, keys::USER_ID, keys::CHAT_ID],
            Self::RoutingError => &[keys::ERROR, keys::EVENT_KIND, keys::USER_ID, keys::CHAT_ID],
        }
    }
}

/// Named values handed to the action handler.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Payload(BTreeMap<&'static str, Value>);

impl Payload {
    fn with(mut self, key: &'static str, value: impl Into<Value>) -> Self {
        self.0.insert(key, value.into());
        self
    }

    /// String value for `key`
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Integer value for `key`
    #[must_use]
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    /// Returns `true` if `key` is present
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Iterate over the keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }
}

/// Outcome of routing one event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingResult {
    /// Coarse grouping
    pub category: RouteCategory,
    /// Handler to invoke
    pub action: RouteAction,
    /// Named handler parameters
    pub payload: Payload,
}

impl RoutingResult {
    fn new(action: RouteAction, payload: Payload) -> Self {
        Self {
            category: action.category(),
            action,
            payload,
        }
    }

    /// Returns `true` if the category matches the action and every key the
    /// action requires is present in the payload.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.category == self.action.category()
            && self
                .action
                .required_keys()
                .iter()
                .all(|key| self.payload.contains(key))
    }
}

/// Static description of the routing tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingStats {
    /// Number of free-text rules (commands included)
    pub text_rules: usize,
    /// Number of callback rules
    pub callback_rules: usize,
    /// Number of supported commands
    pub supported_commands: usize,
}

/// A supported bot command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommandInfo {
    /// Command including the leading slash
    pub command: &'static str,
    /// Short description
    pub description: &'static str,
}

const SUPPORTED_COMMANDS: &[CommandInfo] = &[
    CommandInfo {
        command: "/start",
        description: "Start using the bot",
    },
    CommandInfo {
        command: "/help",
        description: "Show usage instructions",
    },
    CommandInfo {
        command: "/settings",
        description: "Bot settings",
    },
];

/// Stateless event router.
///
/// # Examples
///
/// ```
/// use platebot_core::router::{keys, InboundEvent, RouteAction, Router};
///
/// let event = InboundEvent::Text {
///     text: "123-45-678".to_string(),
///     sender_id: 1,
///     chat_id: 1,
///     message_id: 10,
/// };
/// let routed = Router::new().route(&event);
/// assert_eq!(routed.action, RouteAction::PlateSearch);
/// assert_eq!(routed.payload.get_str(keys::LICENSE_PLATE), Some("12345678"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Router;

impl Router {
    /// Create a router
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Route one event. Always returns a result.
    #[must_use]
    pub fn route(&self, event: &InboundEvent) -> RoutingResult {
        Self::route_guarded(event, Self::route_inner)
    }

    /// Run `classify` on `event`, turning a panic into a routing error result.
    fn route_guarded<F>(event: &InboundEvent, classify: F) -> RoutingResult
    where
        F: FnOnce(&InboundEvent) -> RoutingResult,
    {
        match catch_unwind(AssertUnwindSafe(|| classify(event))) {
            Ok(result) => result,
            Err(panic) => {
                let fault = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown routing fault".to_string());
                Self::routing_error(event, &fault)
            }
        }
    }

    /// Build the error result for a routing fault.
    #[must_use]
    pub fn routing_error(event: &InboundEvent, fault: &str) -> RoutingResult {
        RoutingResult::new(
            RouteAction::RoutingError,
            Payload::default()
                .with(keys::ERROR, fault)
                .with(keys::EVENT_KIND, event.kind().as_str())
                .with(keys::USER_ID, event.sender_id())
                .with(keys::CHAT_ID, event.chat_id()),
        )
    }

    fn route_inner(event: &InboundEvent) -> RoutingResult {
        match event {
            InboundEvent::Text {
                text,
                sender_id,
                chat_id,
                message_id,
            } => Self::route_text(text.trim(), *sender_id, *chat_id, *message_id),
            InboundEvent::Callback {
                data,
                sender_id,
                chat_id,
                message_id,
                callback_id,
            } => {
                let base = Payload::default()
                    .with(keys::USER_ID, *sender_id)
                    .with(keys::CHAT_ID, *chat_id)
                    .with(keys::MESSAGE_ID, *message_id)
                    .with(keys::CALLBACK_QUERY_ID, callback_id.as_str());
                Self::route_callback(data, base)
            }
            InboundEvent::Unsupported {
                sender_id, chat_id, ..
            } => RoutingResult::new(
                RouteAction::Unsupported,
                Payload::default()
                    .with(keys::EVENT_KIND, EventKind::Unsupported.as_str())
                    .with(keys::USER_ID, *sender_id)
                    .with(keys::CHAT_ID, *chat_id),
            ),
        }
    }

    fn route_text(text: &str, sender_id: i64, chat_id: i64, message_id: i32) -> RoutingResult {
        let base = Payload::default()
            .with(keys::USER_ID, sender_id)
            .with(keys::CHAT_ID, chat_id);

        let Some((action, captured)) = first_match(TEXT_RULES, text) else {
            return RoutingResult::new(
                RouteAction::UnrecognizedText,
                base.with(keys::TEXT, text),
            );
        };

        let payload = match (action, captured) {
            (RouteAction::PlateSearch, Captured::Plate(digits)) => base
                .with(keys::LICENSE_PLATE, digits)
                .with(keys::ORIGINAL_TEXT, text)
                .with(keys::MESSAGE_ID, message_id),
            (RouteAction::InvalidPlate, _) => base.with(keys::INVALID_INPUT, text),
            _ => base,
        };
        RoutingResult::new(action, payload)
    }

    fn route_callback(data: &str, base: Payload) -> RoutingResult {
        let Some((action, captured)) = first_match(CALLBACK_RULES, data) else {
            return RoutingResult::new(
                RouteAction::UnrecognizedCallback,
                base.with(keys::CALLBACK_DATA, data),
            );
        };

        let payload = match (action, captured) {
            (RouteAction::ToggleField, Captured::Suffix(field)) => base.with(keys::FIELD_NAME, field),
            (RouteAction::SetLanguage, Captured::Suffix(code)) => base.with(keys::LANGUAGE, code),
            _ => base,
        };
        RoutingResult::new(action, payload)
    }

    /// Commands the bot understands
    #[must_use]
    pub const fn supported_commands() -> &'static [CommandInfo] {
        SUPPORTED_COMMANDS
    }

    /// Sizes of the routing tables
    #[must_use]
    pub fn stats() -> RoutingStats {
        RoutingStats {
            text_rules: TEXT_RULES.len(),
            callback_rules: CALLBACK_RULES.len(),
            supported_commands: SUPPORTED_COMMANDS.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(text: &str) -> RoutingResult {
        Router::new().route(&InboundEvent::Text {
            text: text.to_string(),
            sender_id: 42,
            chat_id: 7,
            message_id: 100,
        })
    }

    fn callback(data: &str) -> RoutingResult {
        Router::new().route(&InboundEvent::Callback {
            data: data.to_string(),
            sender_id: 42,
            chat_id: 7,
            message_id: 100,
            callback_id: "cb-1".to_string(),
        })
    }

    #[test]
    fn test_commands() {
        for (input, action) in [
            ("/start", RouteAction::Start),
            ("/help", RouteAction::Help),
            ("/settings", RouteAction::Settings),
            ("  /start  ", RouteAction::Start),
            ("/help@PlateBot", RouteAction::Help),
        ] {
            let routed = text(input);
            assert_eq!(routed.action, action, "input {input:?}");
            assert_eq!(routed.category, RouteCategory::Command);
            assert_eq!(routed.payload.get_i64(keys::USER_ID), Some(42));
            assert_eq!(routed.payload.get_i64(keys::CHAT_ID), Some(7));
        }
    }

    #[test]
    fn test_plate_search() {
        let routed = text("12345678");
        assert_eq!(routed.action, RouteAction::PlateSearch);
        assert_eq!(routed.category, RouteCategory::LicensePlateSearch);
        assert_eq!(routed.payload.get_str(keys::LICENSE_PLATE), Some("12345678"));
        assert_eq!(routed.payload.get_i64(keys::MESSAGE_ID), Some(100));

        let dashed = text("123-45-678");
        assert_eq!(dashed.action, RouteAction::PlateSearch);
        assert_eq!(dashed.payload.get_str(keys::LICENSE_PLATE), Some("12345678"));
        assert_eq!(dashed.payload.get_str(keys::ORIGINAL_TEXT), Some("123-45-678"));

        let seven = text("12.345.67");
        assert_eq!(seven.payload.get_str(keys::LICENSE_PLATE), Some("1234567"));
    }

    #[test]
    fn test_invalid_plate_does_not_fall_through() {
        for input in ["123", "123456789", "12-34"] {
            let routed = text(input);
            assert_eq!(routed.action, RouteAction::InvalidPlate, "input {input:?}");
            assert_eq!(routed.payload.get_str(keys::INVALID_INPUT), Some(input));
        }
    }

    #[test]
    fn test_unrecognized_text() {
        let routed = text("what is this car?");
        assert_eq!(routed.action, RouteAction::UnrecognizedText);
        assert_eq!(routed.payload.get_str(keys::TEXT), Some("what is this car?"));

        // Too long to be a plate attempt
        assert_eq!(text("123456789012345").action, RouteAction::UnrecognizedText);
        assert_eq!(text("").action, RouteAction::UnrecognizedText);
    }

    #[test]
    fn test_callbacks() {
        let routed = callback("toggle_field_manufacturer");
        assert_eq!(routed.action, RouteAction::ToggleField);
        assert_eq!(routed.category, RouteCategory::FieldToggle);
        assert_eq!(routed.payload.get_str(keys::FIELD_NAME), Some("manufacturer"));
        assert_eq!(routed.payload.get_str(keys::CALLBACK_QUERY_ID), Some("cb-1"));

        let routed = callback("set_language_en");
        assert_eq!(routed.action, RouteAction::SetLanguage);
        assert_eq!(routed.payload.get_str(keys::LANGUAGE), Some("en"));

        assert_eq!(callback("new_search").action, RouteAction::NewSearch);
        assert_eq!(callback("settings_reset").category, RouteCategory::Settings);
        assert_eq!(callback("save_fields").category, RouteCategory::FieldSave);
    }

    #[test]
    fn test_callback_text_is_not_routed_as_command() {
        // Callback payloads never go through the text table
        let routed = callback("12345678");
        assert_eq!(routed.action, RouteAction::UnrecognizedCallback);
        assert_eq!(routed.payload.get_str(keys::CALLBACK_DATA), Some("12345678"));
    }

    #[test]
    fn test_unsupported_event() {
        let routed = Router::new().route(&InboundEvent::Unsupported {
            sender_id: 1,
            chat_id: 2,
            message_id: 3,
        });
        assert_eq!(routed.action, RouteAction::Unsupported);
        assert_eq!(routed.payload.get_str(keys::EVENT_KIND), Some("unsupported"));
    }

    #[test]
    fn test_routing_error_carries_context() {
        let event = InboundEvent::Callback {
            data: "x".to_string(),
            sender_id: 5,
            chat_id: 6,
            message_id: 7,
            callback_id: "q".to_string(),
        };
        let routed = Router::routing_error(&event, "boom");
        assert_eq!(routed.category, RouteCategory::Error);
        assert_eq!(routed.payload.get_str(keys::ERROR), Some("boom"));
        assert_eq!(routed.payload.get_str(keys::EVENT_KIND), Some("callback"));
        assert_eq!(routed.payload.get_i64(keys::USER_ID), Some(5));
        assert_eq!(routed.payload.get_i64(keys::CHAT_ID), Some(6));
        assert!(routed.is_well_formed());
    }

    #[test]
    fn test_panic_while_routing_becomes_error_result() {
        let event = InboundEvent::Text {
            text: "12345678".to_string(),
            sender_id: 42,
            chat_id: 7,
            message_id: 100,
        };

        let routed = Router::route_guarded(&event, |_| panic!("rule table corrupted"));
        assert_eq!(routed.action, RouteAction::RoutingError);
        assert_eq!(routed.category, RouteCategory::Error);
        assert_eq!(routed.payload.get_str(keys::ERROR), Some("rule table corrupted"));
        assert_eq!(routed.payload.get_str(keys::EVENT_KIND), Some("text"));
        assert!(routed.is_well_formed());

        let owned = Router::route_guarded(&event, |_| panic!("{} rules", 3));
        assert_eq!(owned.payload.get_str(keys::ERROR), Some("3 rules"));

        let opaque = Router::route_guarded(&event, |_| std::panic::panic_any(42_u8));
        assert_eq!(
            opaque.payload.get_str(keys::ERROR),
            Some("unknown routing fault")
        );
    }

    #[test]
    fn test_guarded_routing_passes_results_through() {
        let event = InboundEvent::Callback {
            data: "help".to_string(),
            sender_id: 42,
            chat_id: 7,
            message_id: 100,
            callback_id: "cb-1".to_string(),
        };
        let routed = Router::route_guarded(&event, Router::route_inner);
        assert_eq!(routed, callback("help"));
        assert_eq!(routed.action, RouteAction::HelpCallback);
    }

    #[test]
    fn test_results_are_well_formed() {
        let samples = [
            text("/start"),
            text("12345678"),
            text("123"),
            text("hello"),
            callback("help"),
            callback("toggle_field_year"),
            callback("set_language_he"),
            callback("nope"),
        ];
        for routed in samples {
            assert!(routed.is_well_formed(), "{routed:?}");
        }
    }

    #[test]
    fn test_stats() {
        let stats = Router::stats();
        assert_eq!(stats.supported_commands, 3);
        assert_eq!(stats.text_rules, 5);
        assert_eq!(stats.callback_rules, 14);
        assert_eq!(Router::supported_commands()[0].command, "/start");
    }
}
