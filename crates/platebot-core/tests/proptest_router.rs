use platebot_core::router::plate::{is_plate_shape, normalize_plate};
use platebot_core::router::{keys, InboundEvent, RouteAction, Router};
use proptest::prelude::*;

fn text(text: String) -> InboundEvent {
    InboundEvent::Text {
        text,
        sender_id: 1,
        chat_id: 2,
        message_id: 3,
    }
}

proptest! {
    /// Routing is total and always well formed for arbitrary text.
    #[test]
    fn text_routing_is_total(s in "\\PC*") {
        let routed = Router::new().route(&text(s));
        prop_assert!(routed.is_well_formed(), "{:?}", routed);
        prop_assert_ne!(routed.action, RouteAction::RoutingError);
    }

    /// Routing is total and always well formed for arbitrary callback data.
    #[test]
    fn callback_routing_is_total(data in "\\PC*") {
        let routed = Router::new().route(&InboundEvent::Callback {
            data,
            sender_id: 1,
            chat_id: 2,
            message_id: 3,
            callback_id: "q".to_string(),
        });
        prop_assert!(routed.is_well_formed(), "{:?}", routed);
    }

    /// Separators never change the normalized plate.
    #[test]
    fn separators_do_not_change_plate(
        digits in "[0-9]{7,8}",
        separator in "[ .-]",
        split in 1usize..7
    ) {
        let raw = format!("{}{}{}", &digits[..split], separator, &digits[split..]);
        prop_assert_eq!(normalize_plate(&raw), digits.clone());

        let routed = Router::new().route(&text(raw));
        prop_assert_eq!(routed.action, RouteAction::PlateSearch);
        prop_assert_eq!(routed.payload.get_str(keys::LICENSE_PLATE), Some(digits.as_str()));
    }

    /// Plate-shaped input with a bad digit count is never treated as free text.
    #[test]
    fn wrong_digit_count_is_invalid_plate(digits in "[0-9]{1,6}|[0-9]{9,11}") {
        prop_assert!(is_plate_shape(&digits));
        let routed = Router::new().route(&text(digits.clone()));
        prop_assert_eq!(routed.action, RouteAction::InvalidPlate);
        prop_assert_eq!(routed.payload.get_str(keys::INVALID_INPUT), Some(digits.as_str()));
    }

    /// Field toggles capture the suffix verbatim.
    #[test]
    fn toggle_field_captures_suffix(name in "[a-z_]{1,20}") {
        let routed = Router::new().route(&InboundEvent::Callback {
            data: format!("toggle_field_{name}"),
            sender_id: 1,
            chat_id: 2,
            message_id: 3,
            callback_id: "q".to_string(),
        });
        prop_assert_eq!(routed.action, RouteAction::ToggleField);
        prop_assert_eq!(routed.payload.get_str(keys::FIELD_NAME), Some(name.as_str()));
    }
}
