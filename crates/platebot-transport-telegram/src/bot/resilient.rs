//! Telegram API calls with automatic retry.
//!
//! Sends and edits go through [`platebot_core::utils::retry_transport_operation`]
//! so a transient network failure does not lose a search result.

use anyhow::Result;
use platebot_core::utils::{retry_transport_operation, truncate_str};
use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardMarkup, Message, MessageId, ParseMode};
use tracing::{debug, warn};

/// Telegram rejects longer messages; leave room for the truncation marker.
const MAX_MESSAGE_CHARS: usize = 4000;

const ERROR_NOT_MODIFIED: &str = "message is not modified";
const ERROR_NOT_FOUND: &str = "message to edit not found";

fn fit_message(text: &str) -> String {
    if text.chars().count() > MAX_MESSAGE_CHARS {
        let truncated = truncate_str(text, MAX_MESSAGE_CHARS);
        format!("{truncated}...\n\n<i>(message truncated)</i>")
    } else {
        text.to_string()
    }
}

/// Send an HTML message, optionally with an inline keyboard.
///
/// # Errors
///
/// Returns the last Telegram error once all retries are exhausted.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: &str,
    keyboard: Option<InlineKeyboardMarkup>,
) -> Result<Message> {
    let text = fit_message(text);
    retry_transport_operation(|| async {
        let mut req = bot
            .send_message(chat_id, text.clone())
            .parse_mode(ParseMode::Html);
        if let Some(kb) = keyboard.clone() {
            req = req.reply_markup(kb);
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Edit an HTML message, optionally replacing its inline keyboard.
///
/// Returns `Ok(None)` when Telegram reports the content is unchanged.
///
/// # Errors
///
/// Returns the last Telegram error once all retries are exhausted.
pub async fn edit_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    text: &str,
    keyboard: Option<InlineKeyboardMarkup>,
) -> Result<Option<Message>> {
    let text = fit_message(text);
    retry_transport_operation(|| async {
        let mut req = bot
            .edit_message_text(chat_id, msg_id, text.clone())
            .parse_mode(ParseMode::Html);
        if let Some(kb) = keyboard.clone() {
            req = req.reply_markup(kb);
        }
        match req.await {
            Ok(msg) => Ok(Some(msg)),
            Err(e) if e.to_string().contains(ERROR_NOT_MODIFIED) => Ok(None),
            Err(e) => Err(anyhow::anyhow!("Telegram edit error: {e}")),
        }
    })
    .await
}

/// Edit a message, falling back to sending a new one when it is gone.
///
/// Returns `false` only if neither the edit nor the fallback send succeeded.
pub async fn edit_or_send(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    text: &str,
    keyboard: Option<InlineKeyboardMarkup>,
) -> bool {
    match edit_message_resilient(bot, chat_id, msg_id, text, keyboard.clone()).await {
        Ok(Some(_)) => true,
        Ok(None) => {
            debug!("Message update skipped: message is not modified");
            true
        }
        Err(e) => {
            if e.to_string().contains(ERROR_NOT_FOUND) {
                debug!(chat_id = chat_id.0, "Message to edit is gone, sending a new one");
            } else {
                warn!(chat_id = chat_id.0, error = %e, "Failed to edit message after retries");
            }
            match send_message_resilient(bot, chat_id, text, keyboard).await {
                Ok(_) => true,
                Err(e) => {
                    warn!(chat_id = chat_id.0, error = %e, "Fallback send failed");
                    false
                }
            }
        }
    }
}
