use crate::bot;
use crate::bot::handlers::bot_commands;
use crate::bot::{BotContext, PreferencesStore, ThrottleNoticeCache};
use crate::config::{
    get_preferences_max_size, get_preferences_ttl, get_throttle_notice_cache_max_size,
    get_throttle_notice_cooldown, BotSettings,
};
use anyhow::{Context, Result};
use platebot_core::config::PipelineSettings;
use platebot_core::lookup::{CachedLookup, SearchPipeline, VehicleLookupService};
use platebot_core::pipeline::{RateLimiter, ResultCache, SearchGuard};
use platebot_core::router::Router;
use platebot_core::upstream::{HttpDatastore, ResilientFetcher};
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tracing::{error, info, warn};

/// Run the Telegram transport runtime until ctrl-c.
///
/// # Errors
///
/// Returns an error if the HTTP client for the datastore cannot be built.
pub async fn run_bot(settings: Arc<BotSettings>) -> Result<()> {
    let ctx = Arc::new(build_context(&settings.pipeline)?);

    let bot = Bot::new(settings.telegram.telegram_bot_token.clone());
    if let Err(e) = bot.set_my_commands(bot_commands()).await {
        warn!("Failed to register bot commands: {e}");
    }

    let handler = setup_handler();
    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![ctx.clone()])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    shutdown(&ctx);
    Ok(())
}

/// Build every pipeline component from settings.
///
/// Must be called inside a tokio runtime; the rate limiter and result cache
/// start their cleanup tasks here.
///
/// # Errors
///
/// Returns an error if the HTTP client for the datastore cannot be built.
pub fn build_context(settings: &PipelineSettings) -> Result<BotContext> {
    let transport =
        HttpDatastore::from_settings(settings).context("Failed to build datastore HTTP client")?;
    let fetcher = ResilientFetcher::from_settings(Arc::new(transport), settings);
    let cache = Arc::new(ResultCache::<CachedLookup>::from_settings(settings));
    let lookup = Arc::new(VehicleLookupService::new(fetcher, cache, settings));
    let pipeline = SearchPipeline::new(lookup, SearchGuard::new());
    let limiter = Arc::new(RateLimiter::from_settings(settings));

    info!(
        window_ms = settings.rate_limit_window_ms,
        max_requests = settings.rate_limit_max_requests,
        cache_ttl_ms = settings.cache_ttl_ms,
        cache_max_size = settings.cache_max_size,
        retry_attempts = settings.api_retry_attempts,
        "Search pipeline initialized"
    );

    Ok(BotContext {
        router: Router::new(),
        limiter,
        pipeline,
        preferences: init_preferences(),
        throttle: init_throttle_notice(),
    })
}

fn init_throttle_notice() -> ThrottleNoticeCache {
    let cooldown = get_throttle_notice_cooldown();
    let max_size = get_throttle_notice_cache_max_size();

    info!(
        "Initializing ThrottleNoticeCache (cooldown: {}s, max_size: {})",
        cooldown, max_size
    );

    ThrottleNoticeCache::new(cooldown, max_size)
}

fn init_preferences() -> PreferencesStore {
    PreferencesStore::new(get_preferences_ttl(), get_preferences_max_size())
}

/// Stop background tasks and log final statistics
fn shutdown(ctx: &BotContext) {
    let cache = ctx.pipeline.lookup().cache();
    info!(
        limiter = ?ctx.limiter.stats(),
        cache = ?cache.stats(),
        silenced_throttle_notices = ctx.throttle.silenced_count(),
        "Dispatcher stopped, releasing resources"
    );
    ctx.limiter.destroy();
    cache.destroy();
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handle_callback_query))
        .branch(Update::filter_message().endpoint(handle_message))
}

async fn handle_message(
    bot: Bot,
    msg: Message,
    ctx: Arc<BotContext>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::handlers::handle_message(&bot, &ctx, &msg).await {
        error!(chat_id = msg.chat.id.0, "Message handler error: {e}");
    }
    respond(())
}

async fn handle_callback_query(
    bot: Bot,
    q: CallbackQuery,
    ctx: Arc<BotContext>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::handlers::handle_callback(&bot, &ctx, &q).await {
        error!(user_id = q.from.id.0, "Callback handler error: {e}");
    }
    respond(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_context_from_defaults() {
        let ctx = build_context(&PipelineSettings::default()).expect("context builds offline");

        assert_eq!(ctx.limiter.tracked_identities(), 0);
        assert!(ctx.pipeline.lookup().cache().is_empty());
        assert!(ctx.pipeline.guard().is_empty());

        shutdown(&ctx);
    }
}
