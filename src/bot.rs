//! Telegram bot
//!
//! Wires the search client, subscription store, selection manager and the
//! optional renderer into a teloxide dispatcher.
//!
//! Message handling order matters: an open selection sees every message
//! from its user first, then a handler awaiting a confirmation reply, and
//! only then normal command dispatch. A message consumed by either of the
//! first two never reaches a command.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use teloxide::{
    dispatching::UpdateFilterExt,
    dptree,
    error_handlers::LoggingErrorHandler,
    prelude::*,
    types::{InputFile, ReplyParameters},
};
use tracing::{debug, error, info, warn};

use crate::api::{ApiError, ConventionClient};
use crate::config::Config;
use crate::format;
use crate::prompt::ReplyWaiter;
use crate::record::ConventionRecord;
use crate::render::{
    html, ImageRenderer, ScreenshotService, DETAIL_VIEWPORT_WIDTH, LIST_VIEWPORT_WIDTH,
};
use crate::session::{DisplayMode, Resolution, SelectionManager};
use crate::subscription::{channel_scope, SubscriptionStore};

/// How long the full-unsubscribe confirmation waits for a reply.
const CONFIRM_WAIT: Duration = Duration::from_secs(10);

/// Affirmative token for the full-unsubscribe confirmation.
const CONFIRM_TOKEN: &str = "yes";

/// Shared state for all handlers.
pub struct BotData {
    config: Config,
    client: ConventionClient,
    subscriptions: std::sync::Mutex<SubscriptionStore>,
    selections: Arc<SelectionManager>,
    prompts: ReplyWaiter,
    renderer: Option<Arc<dyn ImageRenderer>>,
}

impl BotData {
    fn store(&self) -> Result<std::sync::MutexGuard<'_, SubscriptionStore>> {
        self.subscriptions
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))
    }

    fn scope_for(&self, msg: &Message, user_id: i64) -> String {
        channel_scope(msg.chat.is_private(), msg.chat.id.0, user_id)
    }
}

/// Run the bot until the dispatcher stops.
pub async fn run_bot() -> Result<()> {
    let token = std::env::var("TELEGRAM_BOT_TOKEN").expect("TELEGRAM_BOT_TOKEN must be set");

    let config = Config::from_env()?;
    let subscriptions = SubscriptionStore::open(&config.db_path)?;
    let client = ConventionClient::new(&config.api_url);

    let renderer: Option<Arc<dyn ImageRenderer>> = config
        .render_url
        .as_deref()
        .map(|url| Arc::new(ScreenshotService::new(url)) as Arc<dyn ImageRenderer>);

    let (selections, expiry_rx) = SelectionManager::new(100);

    info!("===========================================");
    info!("  expobot - Starting...");
    info!("===========================================");
    info!("API endpoint: {}", config.api_url);
    info!("Subscription database: {:?}", config.db_path);
    info!(
        "Image commands: query={} batch={} format={} quality={}",
        config.enable_image_query,
        config.enable_image_batch_query,
        config.image_format.as_str(),
        config.screenshot_quality,
    );
    match &config.render_url {
        Some(url) => info!("Screenshot service: {}", url),
        None => info!("Screenshot service: not configured (rendering disabled)"),
    }

    let bot = Bot::new(token);

    info!("Verifying bot token...");
    match bot.get_me().await {
        Ok(me) => {
            info!(
                "Bot authenticated: @{} (ID: {})",
                me.username.as_deref().unwrap_or("unknown"),
                me.id
            );
        }
        Err(e) => {
            error!("Failed to authenticate bot: {}", e);
            anyhow::bail!("Bot authentication failed: {}", e);
        }
    }

    let data = Arc::new(BotData {
        config,
        client,
        subscriptions: std::sync::Mutex::new(subscriptions),
        selections: Arc::clone(&selections),
        prompts: ReplyWaiter::new(),
        renderer,
    });

    // Timeout notices for expired selections.
    let notice_bot = bot.clone();
    tokio::spawn(async move {
        let mut rx = expiry_rx;
        while let Some(expiry) = rx.recv().await {
            if let Err(e) = notice_bot
                .send_message(ChatId(expiry.chat_id), format::MSG_SELECTION_TIMEOUT)
                .await
            {
                warn!(
                    "Failed to send timeout notice to chat {}: {}",
                    expiry.chat_id, e
                );
            }
        }
        warn!("Selection expiry processor stopped");
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(message_handler));

    info!("Starting dispatcher with long polling...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![data])
        .default_handler(|upd| async move {
            debug!("Unhandled update: {:?}", upd);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("Error in message handler"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    warn!("Dispatcher stopped");
    Ok(())
}

/// Message handler endpoint for the dispatcher. Failures are logged and
/// never propagate out of the handler.
async fn message_handler(bot: Bot, msg: Message, data: Arc<BotData>) -> ResponseResult<()> {
    if let Err(e) = handle_message(&bot, &msg, &data).await {
        error!("Error handling message: {:#}", e);
    }
    Ok(())
}

async fn handle_message(bot: &Bot, msg: &Message, data: &Arc<BotData>) -> Result<()> {
    let Some(user_id) = msg.from.as_ref().map(|u| u.id.0 as i64) else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };

    debug!(
        "Message: user={}, chat={}, text={:?}",
        user_id,
        msg.chat.id.0,
        text.chars().take(50).collect::<String>()
    );

    // An open selection intercepts everything from its user, including
    // would-be commands.
    if let Some(resolution) = data.selections.resolve(user_id, text).await {
        return consume_selection(bot, msg, data, resolution).await;
    }

    // A handler suspended on a confirmation reply consumes the message.
    if data.prompts.deliver(user_id, msg.chat.id.0, text).await {
        return Ok(());
    }

    if text.starts_with('/') {
        return handle_command(bot, msg, data, user_id, text).await;
    }

    Ok(())
}

async fn handle_command(
    bot: &Bot,
    msg: &Message,
    data: &Arc<BotData>,
    user_id: i64,
    text: &str,
) -> Result<()> {
    let (cmd, rest) = match text.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (cmd, rest.trim()),
        None => (text, ""),
    };
    // Commands in groups may arrive as /search@botname.
    let cmd = cmd.split('@').next().unwrap_or(cmd);

    match cmd {
        "/start" | "/help" => {
            send_reply(bot, data, msg, &help_text(&data.config)).await?;
        }
        "/search" => cmd_search(bot, msg, data, user_id, rest).await?,
        "/isearch" if data.config.enable_image_query => {
            cmd_image_search(bot, msg, data, user_id, rest).await?;
        }
        "/digest" => cmd_digest(bot, msg, data, user_id).await?,
        "/idigest" if data.config.enable_image_batch_query => {
            cmd_image_digest(bot, msg, data, user_id).await?;
        }
        "/sub" => cmd_subscribe(bot, msg, data, user_id, rest).await?,
        "/unsub" => cmd_unsubscribe(bot, msg, data, user_id, rest).await?,
        "/subs" => cmd_list_subscriptions(bot, msg, data, user_id).await?,
        other => {
            debug!("Ignoring unknown command {:?}", other);
        }
    }

    Ok(())
}

fn help_text(config: &Config) -> String {
    let mut text = String::from(
        "Convention search and subscriptions:\n\
         /search <keyword> - search conventions\n\
         /digest - search all subscribed keywords\n\
         /sub <keyword> - subscribe to a keyword\n\
         /unsub [keyword] - unsubscribe one keyword, or all\n\
         /subs - list subscriptions\n",
    );
    if config.enable_image_query {
        text.push_str("/isearch <keyword> - search, rendered as an image\n");
    }
    if config.enable_image_batch_query {
        text.push_str("/idigest - subscribed search, rendered as an image\n");
    }
    text.push_str("After a search, reply with a number for details, or 0 to cancel.");
    text
}

async fn cmd_search(
    bot: &Bot,
    msg: &Message,
    data: &Arc<BotData>,
    user_id: i64,
    keyword: &str,
) -> Result<()> {
    if keyword.is_empty() {
        send_reply(bot, data, msg, "Provide a keyword, e.g. /search 南京").await?;
        return Ok(());
    }

    data.selections.cancel(user_id).await;

    match data.client.search(keyword).await {
        Ok(records) => {
            send_reply(bot, data, msg, &format::search_results_message(&records)).await?;
            data.selections
                .open(user_id, msg.chat.id.0, records, DisplayMode::Text)
                .await;
        }
        Err(e) => report_search_failure(bot, msg, "search", keyword, e).await?,
    }

    Ok(())
}

async fn cmd_image_search(
    bot: &Bot,
    msg: &Message,
    data: &Arc<BotData>,
    user_id: i64,
    keyword: &str,
) -> Result<()> {
    if keyword.is_empty() {
        send_reply(bot, data, msg, "Provide a keyword, e.g. /isearch 南京").await?;
        return Ok(());
    }

    let Some(renderer) = data.renderer.clone() else {
        send_reply(bot, data, msg, format::MSG_RENDERING_UNAVAILABLE).await?;
        return Ok(());
    };

    data.selections.cancel(user_id).await;

    let wait_msg = send_reply(bot, data, msg, "✨ Querying and rendering, hang on...").await?;

    match data.client.search(keyword).await {
        Ok(records) => {
            let document = html::list_document(&format!("Search: {}", keyword), &records);
            match renderer
                .render(
                    &document,
                    LIST_VIEWPORT_WIDTH,
                    data.config.image_format,
                    data.config.screenshot_quality,
                )
                .await
            {
                Ok(bytes) => {
                    send_photo_reply(bot, data, msg, bytes, Some(format::image_select_footer()))
                        .await?;
                    data.selections
                        .open(user_id, msg.chat.id.0, records, DisplayMode::Image)
                        .await;
                }
                Err(e) => {
                    // No text fallback for the multi-record view.
                    error!("List render for {:?} failed: {}", keyword, e);
                    bot.send_message(msg.chat.id, format::MSG_RENDER_FAILED).await?;
                }
            }
        }
        Err(e) => report_search_failure(bot, msg, "image search", keyword, e).await?,
    }

    let _ = bot.delete_message(msg.chat.id, wait_msg.id).await;
    Ok(())
}

async fn cmd_digest(bot: &Bot, msg: &Message, data: &Arc<BotData>, user_id: i64) -> Result<()> {
    let scope = data.scope_for(msg, user_id);
    let keywords = { data.store()?.list(user_id, &scope)? };

    if keywords.is_empty() {
        send_reply(bot, data, msg, format::MSG_NO_SUBSCRIPTIONS).await?;
        return Ok(());
    }

    data.selections.cancel(user_id).await;

    let records = data.client.search_many(&keywords).await;
    if records.is_empty() {
        send_reply(bot, data, msg, format::MSG_DIGEST_EMPTY).await?;
        return Ok(());
    }

    send_reply(bot, data, msg, &format::digest_results_message(&records)).await?;
    data.selections
        .open(user_id, msg.chat.id.0, records, DisplayMode::Text)
        .await;

    Ok(())
}

async fn cmd_image_digest(
    bot: &Bot,
    msg: &Message,
    data: &Arc<BotData>,
    user_id: i64,
) -> Result<()> {
    let Some(renderer) = data.renderer.clone() else {
        send_reply(bot, data, msg, format::MSG_RENDERING_UNAVAILABLE).await?;
        return Ok(());
    };

    let scope = data.scope_for(msg, user_id);
    let keywords = { data.store()?.list(user_id, &scope)? };

    if keywords.is_empty() {
        send_reply(bot, data, msg, format::MSG_NO_SUBSCRIPTIONS).await?;
        return Ok(());
    }

    data.selections.cancel(user_id).await;

    let wait_msg = send_reply(
        bot,
        data,
        msg,
        &format!(
            "✨ Querying {} subscriptions and rendering, hang on...",
            keywords.len()
        ),
    )
    .await?;

    let records = data.client.search_many(&keywords).await;
    if records.is_empty() {
        send_reply(bot, data, msg, format::MSG_DIGEST_EMPTY).await?;
        let _ = bot.delete_message(msg.chat.id, wait_msg.id).await;
        return Ok(());
    }

    let document = html::list_document("Subscribed conventions", &records);
    match renderer
        .render(
            &document,
            LIST_VIEWPORT_WIDTH,
            data.config.image_format,
            data.config.screenshot_quality,
        )
        .await
    {
        Ok(bytes) => {
            send_photo_reply(bot, data, msg, bytes, Some(format::image_select_footer())).await?;
            data.selections
                .open(user_id, msg.chat.id.0, records, DisplayMode::Image)
                .await;
        }
        Err(e) => {
            error!("Digest render failed: {}", e);
            bot.send_message(msg.chat.id, format::MSG_RENDER_FAILED).await?;
        }
    }

    let _ = bot.delete_message(msg.chat.id, wait_msg.id).await;
    Ok(())
}

async fn cmd_subscribe(
    bot: &Bot,
    msg: &Message,
    data: &Arc<BotData>,
    user_id: i64,
    keyword: &str,
) -> Result<()> {
    if keyword.is_empty() {
        send_reply(bot, data, msg, "Provide a keyword, e.g. /sub 南京").await?;
        return Ok(());
    }

    let scope = data.scope_for(msg, user_id);
    {
        data.store()?.subscribe(user_id, &scope, keyword)?;
    }
    send_reply(bot, data, msg, &format::subscribed_message(keyword)).await?;

    Ok(())
}

async fn cmd_unsubscribe(
    bot: &Bot,
    msg: &Message,
    data: &Arc<BotData>,
    user_id: i64,
    keyword: &str,
) -> Result<()> {
    let scope = data.scope_for(msg, user_id);

    if !keyword.is_empty() {
        let existed = { data.store()?.unsubscribe(user_id, &scope, keyword)? };
        let reply = if existed {
            format::unsubscribed_message(keyword)
        } else {
            format::not_subscribed_message(keyword)
        };
        send_reply(bot, data, msg, &reply).await?;
        return Ok(());
    }

    // Full wipe needs an explicit confirmation within a bounded wait; no
    // reply or any non-affirmative reply leaves the rows untouched.
    send_reply(
        bot,
        data,
        msg,
        "Remove ALL subscriptions here? Reply \"yes\" to confirm.",
    )
    .await?;

    let confirmed = data
        .prompts
        .wait(user_id, msg.chat.id.0, CONFIRM_WAIT)
        .await
        .map(|reply| reply.trim().eq_ignore_ascii_case(CONFIRM_TOKEN))
        .unwrap_or(false);

    if confirmed {
        let removed = { data.store()?.unsubscribe_all(user_id, &scope)? };
        send_reply(bot, data, msg, &format::removed_all_message(removed)).await?;
    } else {
        send_reply(bot, data, msg, format::MSG_CONFIRM_DECLINED).await?;
    }

    Ok(())
}

async fn cmd_list_subscriptions(
    bot: &Bot,
    msg: &Message,
    data: &Arc<BotData>,
    user_id: i64,
) -> Result<()> {
    let scope = data.scope_for(msg, user_id);
    let keywords = { data.store()?.list(user_id, &scope)? };

    if keywords.is_empty() {
        send_reply(bot, data, msg, format::MSG_NO_SUBSCRIPTIONS).await?;
    } else {
        send_reply(bot, data, msg, &format::subscription_list_message(&keywords)).await?;
    }

    Ok(())
}

/// Act on the outcome of offering a message to the selection manager.
async fn consume_selection(
    bot: &Bot,
    msg: &Message,
    data: &Arc<BotData>,
    resolution: Resolution,
) -> Result<()> {
    match resolution {
        Resolution::Cancelled => {
            bot.send_message(msg.chat.id, format::MSG_CANCELLED).await?;
        }
        Resolution::Invalid { .. } => {
            bot.send_message(msg.chat.id, format::MSG_INVALID_CHOICE).await?;
        }
        Resolution::Selected { record, mode } => match mode {
            DisplayMode::Image => send_detail_image(bot, msg, data, &record).await?,
            DisplayMode::Text => send_detail_text(bot, msg, data, &record).await?,
        },
    }

    Ok(())
}

/// Rendered detail card; falls back to the text detail when the renderer
/// is missing or fails.
async fn send_detail_image(
    bot: &Bot,
    msg: &Message,
    data: &Arc<BotData>,
    record: &ConventionRecord,
) -> Result<()> {
    if let Some(renderer) = data.renderer.clone() {
        let logo = data.client.fetch_logo(&record.logo_url).await;
        let document = html::detail_document(record, logo.as_deref());
        match renderer
            .render(
                &document,
                DETAIL_VIEWPORT_WIDTH,
                data.config.image_format,
                data.config.screenshot_quality,
            )
            .await
        {
            Ok(bytes) => {
                send_photo_reply(bot, data, msg, bytes, None).await?;
                return Ok(());
            }
            Err(e) => {
                error!("Detail render for {:?} failed: {}", record.name, e);
            }
        }
    }

    send_detail_text(bot, msg, data, record).await
}

/// Text detail block, with the record's logo attached when it can be
/// fetched.
async fn send_detail_text(
    bot: &Bot,
    msg: &Message,
    data: &Arc<BotData>,
    record: &ConventionRecord,
) -> Result<()> {
    let detail = format::format_detail(record);

    if let Some(logo) = data.client.fetch_logo(&record.logo_url).await {
        match send_photo_reply(bot, data, msg, logo, Some(&detail)).await {
            Ok(_) => return Ok(()),
            Err(e) => warn!("Sending logo photo failed: {}", e),
        }
    }

    send_reply(bot, data, msg, &detail).await?;
    Ok(())
}

async fn report_search_failure(
    bot: &Bot,
    msg: &Message,
    operation: &str,
    keyword: &str,
    error: ApiError,
) -> Result<()> {
    match error {
        ApiError::Transport(e) => {
            error!("{} {:?} failed: {}", operation, keyword, e);
            bot.send_message(msg.chat.id, format::MSG_SEARCH_FAILED).await?;
        }
        e => {
            debug!("{} {:?}: {}", operation, keyword, e);
            bot.send_message(msg.chat.id, format::MSG_NOT_FOUND).await?;
        }
    }
    Ok(())
}

async fn send_reply(bot: &Bot, data: &BotData, msg: &Message, text: &str) -> Result<Message> {
    let mut request = bot.send_message(msg.chat.id, text);
    if data.config.quote_replies {
        request = request.reply_parameters(ReplyParameters::new(msg.id));
    }
    Ok(request.await?)
}

async fn send_photo_reply(
    bot: &Bot,
    data: &BotData,
    msg: &Message,
    bytes: Vec<u8>,
    caption: Option<&str>,
) -> Result<Message> {
    let mut request = bot.send_photo(msg.chat.id, InputFile::memory(bytes));
    if let Some(caption) = caption {
        request = request.caption(caption.to_string());
    }
    if data.config.quote_replies {
        request = request.reply_parameters(ReplyParameters::new(msg.id));
    }
    Ok(request.await?)
}
