//! Telegram front end: dispatcher, daily broadcast and state flushing.

mod handlers;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode};
use tracing::{error, info, warn};

pub use handlers::{pick_choice, Command};

use crate::messages::PostMessage;
use crate::services::{run_daily_notification, DailySchedule, LatestPostService, MessageSink, RetryPolicy};
use crate::store::StateStore;

/// Shared dependencies of every handler.
pub struct BotContext {
    pub service: LatestPostService,
    pub state: StateStore,
    pub retry: RetryPolicy,
    pub schedule: DailySchedule,
    pub flush_interval: Duration,
}

/// Inline keyboard for a message's link button, if it has a valid one.
pub fn keyboard_for(message: &PostMessage) -> Option<InlineKeyboardMarkup> {
    let button = message.button.as_ref()?;
    match url::Url::parse(&button.url) {
        Ok(url) => Some(InlineKeyboardMarkup::new(vec![vec![
            InlineKeyboardButton::url(button.label.clone(), url),
        ]])),
        Err(e) => {
            warn!("Dropping button with invalid URL {:?}: {}", button.url, e);
            None
        }
    }
}

/// Sends broadcast messages through the Bot API.
pub struct TelegramSink {
    bot: Bot,
}

impl TelegramSink {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl MessageSink for TelegramSink {
    async fn send(&self, chat_id: i64, message: &PostMessage) -> anyhow::Result<()> {
        let request = self
            .bot
            .send_message(ChatId(chat_id), message.text.clone())
            .parse_mode(ParseMode::Html);
        match keyboard_for(message) {
            Some(keyboard) => request.reply_markup(keyboard).await?,
            None => request.await?,
        };
        Ok(())
    }
}

/// Run the daily broadcast forever.
pub async fn daily_loop(ctx: Arc<BotContext>, sink: Arc<dyn MessageSink>) {
    loop {
        let wait = ctx.schedule.until_next(Utc::now());
        info!(
            "Next daily post at {} (in {}s)",
            ctx.schedule.next_after(Utc::now()),
            wait.as_secs()
        );
        tokio::time::sleep(wait).await;

        match run_daily_notification(&ctx.service, &ctx.state, sink.as_ref(), ctx.retry).await {
            Ok(report) if report.failed.is_empty() => {}
            Ok(report) => warn!("Daily post failed for chats {:?}", report.failed),
            Err(e) => error!("Daily post aborted: {}", e),
        }
    }
}

/// Persist deferred state on a fixed interval.
pub async fn flush_loop(state: StateStore, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick fires immediately
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if let Err(e) = state.flush().await {
            error!("Failed to flush bot state: {}", e);
        }
    }
}

/// Poll Telegram until Ctrl-C, with the daily job running alongside.
pub async fn run(bot: Bot, ctx: BotContext) -> anyhow::Result<()> {
    // Surface a corrupted blob before accepting updates
    let subscribers = ctx.state.subscribers().await?;
    info!(
        "Loaded {} subscribers, daily post at {}",
        subscribers.len(),
        ctx.schedule
    );

    let ctx = Arc::new(ctx);
    let sink: Arc<dyn MessageSink> = Arc::new(TelegramSink::new(bot.clone()));
    let daily = tokio::spawn(daily_loop(ctx.clone(), sink));
    let flusher = ctx
        .state
        .is_deferred()
        .then(|| tokio::spawn(flush_loop(ctx.state.clone(), ctx.flush_interval)));

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(handlers::handle_command),
                )
                .branch(dptree::endpoint(handlers::handle_message)),
        )
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![ctx.clone()])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Shutting down");
    daily.abort();
    if let Some(flusher) = flusher {
        flusher.abort();
    }
    ctx.state.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::LinkButton;

    #[test]
    fn test_keyboard_only_for_valid_links() {
        let found = PostMessage {
            text: "x".into(),
            button: Some(LinkButton {
                label: "Go to Post".into(),
                url: "https://www.facebook.com/thoitietHN/posts/1".into(),
            }),
        };
        assert!(keyboard_for(&found).is_some());
        assert!(keyboard_for(&PostMessage::failure()).is_none());

        let broken = PostMessage {
            button: Some(LinkButton {
                label: "Go to Post".into(),
                url: "not a url".into(),
            }),
            ..found
        };
        assert!(keyboard_for(&broken).is_none());
    }
}
