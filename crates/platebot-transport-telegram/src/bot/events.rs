//! Conversion of Telegram updates into inbound events.

use platebot_core::router::InboundEvent;
use teloxide::types::{CallbackQuery, Message};

/// Safely extract user ID from a message, returning 0 if unavailable
#[must_use]
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// Inbound event for a message: text, or unsupported for anything else
#[must_use]
pub fn message_event(msg: &Message) -> InboundEvent {
    let sender_id = get_user_id_safe(msg);
    let chat_id = msg.chat.id.0;
    let message_id = msg.id.0;

    match msg.text() {
        Some(text) => InboundEvent::Text {
            text: text.to_string(),
            sender_id,
            chat_id,
            message_id,
        },
        None => InboundEvent::Unsupported {
            sender_id,
            chat_id,
            message_id,
        },
    }
}

/// Inbound event for a callback query.
///
/// Returns `None` when the query carries no data or its message is unknown,
/// since there is nothing to route or edit.
#[must_use]
pub fn callback_event(q: &CallbackQuery) -> Option<InboundEvent> {
    let data = q.data.as_deref()?;
    let message = q.message.as_ref()?;

    Some(InboundEvent::Callback {
        data: data.to_string(),
        sender_id: q.from.id.0.cast_signed(),
        chat_id: message.chat().id.0,
        message_id: message.id().0,
        callback_id: q.id.0.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(extra: serde_json::Value) -> Message {
        let mut value = json!({
            "message_id": 10,
            "date": 1_700_000_000,
            "chat": {"id": 42, "type": "private", "first_name": "Dana"},
            "from": {"id": 7, "is_bot": false, "first_name": "Dana"}
        });
        if let (Some(obj), serde_json::Value::Object(extra)) = (value.as_object_mut(), extra) {
            obj.extend(extra);
        }
        serde_json::from_value(value).expect("valid message json")
    }

    #[test]
    fn test_text_message_event() {
        let event = message_event(&message(json!({"text": "12-345-678"})));
        assert_eq!(
            event,
            InboundEvent::Text {
                text: "12-345-678".to_string(),
                sender_id: 7,
                chat_id: 42,
                message_id: 10,
            }
        );
    }

    #[test]
    fn test_non_text_message_is_unsupported() {
        let event = message_event(&message(json!({
            "location": {"latitude": 32.08, "longitude": 34.78}
        })));
        assert!(matches!(
            event,
            InboundEvent::Unsupported {
                sender_id: 7,
                chat_id: 42,
                message_id: 10
            }
        ));
    }

    #[test]
    fn test_callback_event() {
        let q: CallbackQuery = serde_json::from_value(json!({
            "id": "cb-1",
            "from": {"id": 7, "is_bot": false, "first_name": "Dana"},
            "chat_instance": "ci",
            "data": "toggle_field_color",
            "message": {
                "message_id": 11,
                "date": 1_700_000_000,
                "chat": {"id": 42, "type": "private", "first_name": "Dana"},
                "text": "Settings"
            }
        }))
        .expect("valid callback json");

        assert_eq!(
            callback_event(&q),
            Some(InboundEvent::Callback {
                data: "toggle_field_color".to_string(),
                sender_id: 7,
                chat_id: 42,
                message_id: 11,
                callback_id: "cb-1".to_string(),
            })
        );
    }
}
