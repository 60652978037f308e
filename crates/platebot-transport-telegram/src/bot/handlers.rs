//! Message and callback handlers
//!
//! Every update is turned into an inbound event, routed, and then handled
//! according to its [`RouteAction`].

use crate::bot::events::{callback_event, message_event};
use crate::bot::preferences::{Language, PreferencesStore, UserPreferences};
use crate::bot::resilient::{edit_or_send, send_message_resilient};
use crate::bot::throttle_notice::ThrottleNoticeCache;
use crate::bot::views;
use anyhow::Result;
use platebot_core::lookup::{SearchOutcome, SearchPipeline};
use platebot_core::pipeline::RateLimiter;
use platebot_core::router::{keys, InboundEvent, Payload, RouteAction, Router, RoutingResult};
use platebot_core::upstream::classify::Severity;
use platebot_core::vehicle::DisplayField;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{CallbackQueryId, InlineKeyboardMarkup, MessageId};
use teloxide::utils::command::BotCommands;
use tracing::{debug, error, info, warn};

/// Supported commands
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Main menu
    #[command(description = "open the main menu")]
    Start,
    /// Help
    #[command(description = "show help")]
    Help,
    /// Settings
    #[command(description = "choose which details are shown")]
    Settings,
}

/// Components shared by all handlers.
#[derive(Clone)]
pub struct BotContext {
    /// Event router
    pub router: Router,
    /// Per-user admission control for messages and button-started searches
    pub limiter: Arc<RateLimiter>,
    /// Guarded plate search
    pub pipeline: SearchPipeline,
    /// Display preferences
    pub preferences: PreferencesStore,
    /// Flood guard for "too many requests" notices
    pub throttle: ThrottleNoticeCache,
}

/// Where a handler replies.
#[derive(Debug, Clone)]
struct Target {
    user_id: i64,
    chat_id: ChatId,
    message_id: Option<MessageId>,
    callback_id: Option<String>,
}

impl Target {
    fn from_payload(payload: &Payload) -> Self {
        Self {
            user_id: payload.get_i64(keys::USER_ID).unwrap_or_default(),
            chat_id: ChatId(payload.get_i64(keys::CHAT_ID).unwrap_or_default()),
            message_id: payload
                .get_i64(keys::MESSAGE_ID)
                .and_then(|id| i32::try_from(id).ok())
                .map(MessageId),
            callback_id: payload.get_str(keys::CALLBACK_QUERY_ID).map(str::to_string),
        }
    }
}

/// Answer the callback query of `target`, if any, optionally with a toast.
async fn answer(bot: &Bot, target: &Target, toast: Option<&str>) {
    let Some(id) = target.callback_id.clone() else {
        return;
    };
    let mut req = bot.answer_callback_query(CallbackQueryId(id));
    if let Some(text) = toast {
        req = req.text(text);
    }
    if let Err(e) = req.await {
        debug!(user_id = target.user_id, error = %e, "Failed to answer callback query");
    }
}

/// Replace the callback's message, or send a new one for text events.
async fn show(bot: &Bot, target: &Target, text: &str, keyboard: InlineKeyboardMarkup) -> Result<()> {
    match (&target.callback_id, target.message_id) {
        (Some(_), Some(msg_id)) => {
            edit_or_send(bot, target.chat_id, msg_id, text, Some(keyboard)).await;
        }
        _ => {
            send_message_resilient(bot, target.chat_id, text, Some(keyboard)).await?;
        }
    }
    Ok(())
}

/// Handle an incoming message: admission control, then routing.
///
/// # Errors
///
/// Returns an error if a reply could not be delivered.
pub async fn handle_message(bot: &Bot, ctx: &BotContext, msg: &Message) -> Result<()> {
    let event = message_event(msg);
    let user_id = event.sender_id();

    let decision = ctx.limiter.check(user_id);
    if !decision.allowed {
        return notify_throttled(bot, ctx, msg.chat.id, user_id, decision.retry_after_secs).await;
    }

    let routed = ctx.router.route(&event);
    dispatch(bot, ctx, &event, &routed).await
}

/// Handle a callback query.
///
/// Only callbacks that start a datastore search go through admission control.
///
/// # Errors
///
/// Returns an error if a reply could not be delivered.
pub async fn handle_callback(bot: &Bot, ctx: &BotContext, q: &CallbackQuery) -> Result<()> {
    let Some(event) = callback_event(q) else {
        if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
            debug!(user_id = q.from.id.0, error = %e, "Failed to answer callback query");
        }
        return Ok(());
    };

    let routed = ctx.router.route(&event);
    dispatch(bot, ctx, &event, &routed).await
}

async fn notify_throttled(
    bot: &Bot,
    ctx: &BotContext,
    chat_id: ChatId,
    user_id: i64,
    retry_after_secs: u64,
) -> Result<()> {
    if !ctx.throttle.should_notify(user_id).await {
        return Ok(());
    }

    info!(user_id, retry_after_secs, "Request throttled, notifying user");
    send_message_resilient(bot, chat_id, &views::rate_limited_text(retry_after_secs), None).await?;
    ctx.throttle.mark_notified(user_id).await;
    Ok(())
}

/// Run the handler for a routed event.
///
/// # Errors
///
/// Returns an error if a reply could not be delivered.
pub async fn dispatch(
    bot: &Bot,
    ctx: &BotContext,
    event: &InboundEvent,
    routed: &RoutingResult,
) -> Result<()> {
    if !routed.is_well_formed() {
        let fault = format!("payload of {:?} is missing required keys", routed.action);
        return routing_error(bot, &Router::routing_error(event, &fault)).await;
    }

    let target = Target::from_payload(&routed.payload);
    let payload = &routed.payload;
    debug!(
        user_id = target.user_id,
        action = ?routed.action,
        category = ?routed.category,
        "Dispatching routed event"
    );

    match routed.action {
        RouteAction::Start | RouteAction::MainMenu => send_main_menu(bot, &target).await,
        RouteAction::Help | RouteAction::HelpCallback => show_help(bot, &target).await,
        RouteAction::Settings | RouteAction::SettingsCallback => {
            let prefs = ctx.preferences.get(target.user_id).await;
            show_settings(bot, &target, &prefs, None).await
        }
        RouteAction::NewSearch => prompt_search(bot, &target).await,
        RouteAction::CancelSearch => cancel_search(bot, &target).await,
        RouteAction::RetrySearch => retry_search(bot, ctx, &target).await,
        RouteAction::PlateSearch => {
            let plate = payload.get_str(keys::LICENSE_PLATE).unwrap_or_default();
            plate_search(bot, ctx, &target, plate).await
        }
        RouteAction::InvalidPlate => {
            let input = payload.get_str(keys::INVALID_INPUT).unwrap_or_default();
            reply(bot, &target, &views::invalid_plate_text(input)).await
        }
        RouteAction::FieldsSettings => show_fields(bot, ctx, &target).await,
        RouteAction::LanguageSettings => show_languages(bot, ctx, &target).await,
        RouteAction::CompactSettings => {
            let prefs = ctx.preferences.update(target.user_id, |p| p.compact = !p.compact).await;
            show_settings(bot, &target, &prefs, None).await
        }
        RouteAction::NotificationsSettings => {
            let prefs = ctx
                .preferences
                .update(target.user_id, |p| p.notifications = !p.notifications)
                .await;
            show_settings(bot, &target, &prefs, None).await
        }
        RouteAction::ResetSettings => {
            ctx.preferences.reset(target.user_id).await;
            let toast = Some(views::settings_reset_text());
            show_settings(bot, &target, &UserPreferences::default(), toast).await
        }
        RouteAction::ToggleField => {
            let field = payload.get_str(keys::FIELD_NAME).unwrap_or_default();
            toggle_field(bot, ctx, &target, field).await
        }
        RouteAction::SaveFields => {
            let prefs = ctx.preferences.get(target.user_id).await;
            show_settings(bot, &target, &prefs, Some(views::fields_saved_text())).await
        }
        RouteAction::SetLanguage => {
            let code = payload.get_str(keys::LANGUAGE).unwrap_or_default();
            set_language(bot, ctx, &target, code).await
        }
        RouteAction::UnrecognizedText => reply(bot, &target, views::unrecognized_text()).await,
        RouteAction::UnrecognizedCallback => {
            warn!(
                user_id = target.user_id,
                data = payload.get_str(keys::CALLBACK_DATA).unwrap_or_default(),
                "Unrecognized callback data"
            );
            answer(bot, &target, Some(views::unknown_button_text())).await;
            Ok(())
        }
        RouteAction::Unsupported => reply(bot, &target, views::unsupported_text()).await,
        RouteAction::RoutingError => routing_error(bot, routed).await,
    }
}

async fn reply(bot: &Bot, target: &Target, text: &str) -> Result<()> {
    answer(bot, target, None).await;
    send_message_resilient(bot, target.chat_id, text, None).await?;
    Ok(())
}

async fn routing_error(bot: &Bot, routed: &RoutingResult) -> Result<()> {
    let target = Target::from_payload(&routed.payload);
    error!(
        user_id = target.user_id,
        event_kind = routed.payload.get_str(keys::EVENT_KIND).unwrap_or_default(),
        error = routed.payload.get_str(keys::ERROR).unwrap_or_default(),
        "Routing failed"
    );
    reply(bot, &target, views::internal_error_text()).await
}

async fn send_main_menu(bot: &Bot, target: &Target) -> Result<()> {
    answer(bot, target, None).await;
    show(bot, target, views::welcome_text(), views::main_menu_keyboard()).await
}

async fn show_help(bot: &Bot, target: &Target) -> Result<()> {
    answer(bot, target, None).await;
    show(bot, target, views::help_text(), views::back_keyboard()).await
}

async fn prompt_search(bot: &Bot, target: &Target) -> Result<()> {
    answer(bot, target, None).await;
    show(bot, target, views::new_search_prompt(), views::cancel_keyboard()).await
}

async fn cancel_search(bot: &Bot, target: &Target) -> Result<()> {
    answer(bot, target, None).await;
    show(bot, target, views::cancelled_text(), views::main_menu_keyboard()).await
}

/// Repeat the last search of the user.
///
/// Button-started searches draw on the same admission budget as messages.
async fn retry_search(bot: &Bot, ctx: &BotContext, target: &Target) -> Result<()> {
    let prefs = ctx.preferences.get(target.user_id).await;
    let Some(plate) = prefs.last_plate else {
        return prompt_search(bot, target).await;
    };
    answer(bot, target, None).await;

    let decision = ctx.limiter.check(target.user_id);
    if !decision.allowed {
        return notify_throttled(bot, ctx, target.chat_id, target.user_id, decision.retry_after_secs)
            .await;
    }
    plate_search(bot, ctx, target, &plate).await
}

/// Run a plate search and deliver its outcome.
///
/// With search notices enabled a progress message is sent first and then
/// edited into the result.
async fn plate_search(bot: &Bot, ctx: &BotContext, target: &Target, plate: &str) -> Result<()> {
    let prefs = ctx
        .preferences
        .update(target.user_id, |p| p.last_plate = Some(plate.to_string()))
        .await;
    info!(user_id = target.user_id, plate, "Plate search requested");

    let progress = if prefs.notifications {
        Some(send_message_resilient(bot, target.chat_id, &views::searching_text(plate), None).await?)
    } else {
        None
    };

    let outcome = ctx.pipeline.search(target.user_id, plate).await;
    log_outcome(target.user_id, &outcome);
    let (text, keyboard) = views::outcome_view(&outcome, &prefs);

    match progress {
        Some(msg) => {
            edit_or_send(bot, target.chat_id, msg.id, &text, Some(keyboard)).await;
        }
        None => {
            send_message_resilient(bot, target.chat_id, &text, Some(keyboard)).await?;
        }
    }
    Ok(())
}

fn log_outcome(user_id: i64, outcome: &SearchOutcome) {
    let SearchOutcome::Failed(e) = outcome else {
        return;
    };
    let kind = e.settled_kind().as_str();
    match e.classification.severity {
        Severity::Info => info!(user_id, kind, attempts = e.attempts, error = %e, "Plate search failed"),
        Severity::Warning => warn!(user_id, kind, attempts = e.attempts, error = %e, "Plate search failed"),
        Severity::Error => error!(user_id, kind, attempts = e.attempts, error = %e, "Plate search failed"),
    }
}

async fn show_settings(
    bot: &Bot,
    target: &Target,
    prefs: &UserPreferences,
    toast: Option<&str>,
) -> Result<()> {
    answer(bot, target, toast).await;
    show(bot, target, &views::settings_text(prefs), views::settings_keyboard(prefs)).await
}

async fn show_fields(bot: &Bot, ctx: &BotContext, target: &Target) -> Result<()> {
    let prefs = ctx.preferences.get(target.user_id).await;
    answer(bot, target, None).await;
    show(bot, target, views::fields_text(), views::fields_keyboard(&prefs)).await
}

async fn show_languages(bot: &Bot, ctx: &BotContext, target: &Target) -> Result<()> {
    let prefs = ctx.preferences.get(target.user_id).await;
    answer(bot, target, None).await;
    show(
        bot,
        target,
        &views::language_text(prefs.language),
        views::language_keyboard(prefs.language),
    )
    .await
}

async fn toggle_field(bot: &Bot, ctx: &BotContext, target: &Target, name: &str) -> Result<()> {
    let Ok(field) = name.parse::<DisplayField>() else {
        warn!(user_id = target.user_id, field = name, "Unknown display field");
        answer(bot, target, Some(views::unknown_option_text())).await;
        return Ok(());
    };

    let prefs = ctx
        .preferences
        .update(target.user_id, |p| {
            p.toggle(field);
        })
        .await;
    let toast = views::field_toggled_text(field, prefs.shows(field));
    answer(bot, target, Some(toast.as_str())).await;
    show(bot, target, views::fields_text(), views::fields_keyboard(&prefs)).await
}

async fn set_language(bot: &Bot, ctx: &BotContext, target: &Target, code: &str) -> Result<()> {
    let Ok(language) = code.parse::<Language>() else {
        warn!(user_id = target.user_id, code, "Unsupported language");
        answer(bot, target, Some(views::unknown_option_text())).await;
        return Ok(());
    };

    let prefs = ctx
        .preferences
        .update(target.user_id, |p| p.language = language)
        .await;
    let toast = format!("Language: {}", language.display_name());
    show_settings(bot, target, &prefs, Some(toast.as_str())).await
}

/// Commands registered with Telegram for the command menu
#[must_use]
pub fn bot_commands() -> Vec<teloxide::types::BotCommand> {
    Command::bot_commands()
}
