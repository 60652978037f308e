//! Every button the bot renders must route to a real handler.

use platebot_core::router::{keys, InboundEvent, RouteAction, Router};
use platebot_transport_telegram::bot::preferences::{Language, UserPreferences};
use platebot_transport_telegram::bot::views;
use teloxide::types::{InlineKeyboardButtonKind, InlineKeyboardMarkup};

fn callback_data(markup: &InlineKeyboardMarkup) -> Vec<String> {
    markup
        .inline_keyboard
        .iter()
        .flatten()
        .filter_map(|b| match &b.kind {
            InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
            _ => None,
        })
        .collect()
}

fn route(data: &str) -> platebot_core::router::RoutingResult {
    Router::new().route(&InboundEvent::Callback {
        data: data.to_string(),
        sender_id: 7,
        chat_id: 42,
        message_id: 100,
        callback_id: "cb".to_string(),
    })
}

#[test]
fn every_rendered_button_is_routable() {
    let prefs = UserPreferences::default();
    let keyboards = [
        views::main_menu_keyboard(),
        views::back_keyboard(),
        views::cancel_keyboard(),
        views::result_keyboard(),
        views::failure_keyboard(),
        views::settings_keyboard(&prefs),
        views::fields_keyboard(&prefs),
        views::language_keyboard(Language::Hebrew),
    ];

    for markup in &keyboards {
        for data in callback_data(markup) {
            let routed = route(&data);
            assert_ne!(
                routed.action,
                RouteAction::UnrecognizedCallback,
                "button {data} does not route"
            );
            assert!(routed.is_well_formed(), "button {data}: {routed:?}");
        }
    }
}

#[test]
fn field_buttons_carry_parseable_field_names() {
    let markup = views::fields_keyboard(&UserPreferences::default());
    for data in callback_data(&markup)
        .into_iter()
        .filter(|d| d.starts_with(views::CB_TOGGLE_FIELD_PREFIX))
    {
        let routed = route(&data);
        assert_eq!(routed.action, RouteAction::ToggleField);
        let name = routed
            .payload
            .get_str(keys::FIELD_NAME)
            .expect("field name captured");
        assert!(
            name.parse::<platebot_core::vehicle::DisplayField>().is_ok(),
            "{name} is not a display field"
        );
    }
}

#[test]
fn language_buttons_carry_supported_codes() {
    let markup = views::language_keyboard(Language::English);
    for data in callback_data(&markup) {
        let routed = route(&data);
        assert_eq!(routed.action, RouteAction::SetLanguage);
        let code = routed
            .payload
            .get_str(keys::LANGUAGE)
            .expect("language code captured");
        assert!(code.parse::<Language>().is_ok(), "{code} is not supported");
    }
}
