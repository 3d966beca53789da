//! Subcommand implementations.

use console::style;
use teloxide::Bot;

use crate::bot::{self, BotContext, TelegramSink};
use crate::config::Settings;
use crate::scrapers::ExtractOutcome;
use crate::services::run_daily_notification;

pub async fn cmd_run(settings: &Settings) -> anyhow::Result<()> {
    let bot = Bot::new(settings.require_bot_token()?);
    let services = settings.build_services().await?;

    let ctx = BotContext {
        service: services.latest_post,
        state: services.state,
        retry: settings.retry_policy(),
        schedule: settings.schedule()?,
        flush_interval: settings.flush_interval(),
    };
    bot::run(bot, ctx).await
}

pub async fn cmd_fetch(settings: &Settings, force: bool) -> anyhow::Result<()> {
    let services = settings.build_services().await?;

    match services.latest_post.fetch(force).await? {
        ExtractOutcome::Found(url) => {
            println!("{} {}", style("✓").green(), url);
            Ok(())
        }
        ExtractOutcome::NotFound => {
            println!(
                "{} No post link found on {}",
                style("!").yellow(),
                settings.page_id
            );
            Ok(())
        }
        ExtractOutcome::Fault(reason) => {
            println!("{} {}", style("✗").red(), reason);
            anyhow::bail!("Failed to load {}", settings.page_id)
        }
    }
}

pub async fn cmd_subscribers(settings: &Settings) -> anyhow::Result<()> {
    let services = settings.build_services().await?;
    let subscribers = services.state.subscribers().await?;

    if subscribers.is_empty() {
        println!("{} No subscribers yet", style("!").yellow());
        return Ok(());
    }

    println!("{}", style(format!("Subscribers ({})", subscribers.len())).bold());
    for chat_id in subscribers {
        println!("  {}", chat_id);
    }
    Ok(())
}

pub async fn cmd_notify(settings: &Settings) -> anyhow::Result<()> {
    let bot = Bot::new(settings.require_bot_token()?);
    let services = settings.build_services().await?;
    let sink = TelegramSink::new(bot);

    let report = run_daily_notification(
        &services.latest_post,
        &services.state,
        &sink,
        settings.retry_policy(),
    )
    .await?;

    println!(
        "{} Delivered to {} chats",
        style("✓").green(),
        report.delivered.len()
    );
    for (chat_id, reason) in &report.failed {
        println!("  {} {}: {}", style("✗").red(), chat_id, reason);
    }
    Ok(())
}
