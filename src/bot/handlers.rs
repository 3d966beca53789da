//! Update handlers: commands, callback buttons and private-chat tracking.

use std::sync::Arc;

use rand::seq::SliceRandom;
use teloxide::payloads::{EditMessageTextSetters, SendMessageSetters};
use teloxide::prelude::*;
use teloxide::types::{Chat, InlineKeyboardButton, InlineKeyboardMarkup, ParseMode};
use teloxide::utils::command::BotCommands;
use tracing::{debug, warn};

use super::{keyboard_for, BotContext};
use crate::messages::{self, PostMessage, GET_LATEST_POST_BUTTON, RANDOM_CHOICE_USAGE};
use crate::store::{StateStore, StoreResult};

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "snake_case", description = "Supported commands:")]
pub enum Command {
    #[command(description = "show the weather menu.")]
    Weather,
    #[command(description = "pick one of the given choices.")]
    RandomChoice(String),
}

/// Record `chat` as a subscriber if it is private.
///
/// Returns `true` only the first time a private chat is seen.
pub async fn register_chat(state: &StateStore, chat: &Chat) -> StoreResult<bool> {
    if !chat.is_private() {
        return Ok(false);
    }
    state.record_subscriber(chat.id.0).await
}

/// Remember a private chat the first time it writes, and greet it.
pub async fn track_private_chat(bot: &Bot, msg: &Message, ctx: &BotContext) -> anyhow::Result<()> {
    match register_chat(&ctx.state, &msg.chat).await {
        Ok(true) => {
            bot.send_message(msg.chat.id, messages::welcome(&full_name(msg)))
                .await?;
        }
        Ok(false) => {}
        Err(e) => warn!("Failed to record chat {}: {}", msg.chat.id, e),
    }
    Ok(())
}

pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    ctx: Arc<BotContext>,
) -> anyhow::Result<()> {
    track_private_chat(&bot, &msg, &ctx).await?;
    debug!("Command from chat {}: {:?}", msg.chat.id, cmd);

    match cmd {
        Command::Weather => {
            let menu = InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
                GET_LATEST_POST_BUTTON,
                GET_LATEST_POST_BUTTON,
            )]]);
            bot.send_message(msg.chat.id, messages::weather_menu(first_name(&msg)))
                .parse_mode(ParseMode::Html)
                .reply_markup(menu)
                .await?;
        }
        Command::RandomChoice(args) => {
            let text = match pick_choice(&args, &mut rand::thread_rng()) {
                Some(pick) => messages::random_choice(pick),
                None => RANDOM_CHOICE_USAGE.to_string(),
            };
            bot.send_message(msg.chat.id, text).await?;
        }
    }
    Ok(())
}

/// Any other message only feeds chat tracking.
pub async fn handle_message(bot: Bot, msg: Message, ctx: Arc<BotContext>) -> anyhow::Result<()> {
    track_private_chat(&bot, &msg, &ctx).await
}

/// The menu button: look up the latest post and replace the menu with it.
pub async fn handle_callback(bot: Bot, q: CallbackQuery, ctx: Arc<BotContext>) -> anyhow::Result<()> {
    if q.data.as_deref() != Some(GET_LATEST_POST_BUTTON) {
        return Ok(());
    }
    bot.answer_callback_query(q.id.clone()).await?;

    let Some((chat_id, message_id)) = q.message.as_ref().map(|m| (m.chat().id, m.id())) else {
        debug!("Callback {} has no message to edit", q.id);
        return Ok(());
    };

    let message = match ctx.service.fetch(false).await {
        Ok(outcome) => PostMessage::from_outcome(&outcome),
        Err(e) => {
            warn!("Post cache unavailable: {}", e);
            PostMessage::failure()
        }
    };

    let edit = bot
        .edit_message_text(chat_id, message_id, message.text.clone())
        .parse_mode(ParseMode::Html);
    match keyboard_for(&message) {
        Some(keyboard) => edit.reply_markup(keyboard).await?,
        None => edit.await?,
    };
    Ok(())
}

/// Pick one whitespace-separated choice, or `None` when there are none.
pub fn pick_choice<'a, R: rand::Rng + ?Sized>(args: &'a str, rng: &mut R) -> Option<&'a str> {
    let choices: Vec<&str> = args.split_whitespace().collect();
    choices.choose(rng).copied()
}

/// Sender's first name, falling back to the chat's.
fn first_name(msg: &Message) -> &str {
    msg.from
        .as_ref()
        .map(|user| user.first_name.as_str())
        .or_else(|| msg.chat.first_name())
        .unwrap_or_default()
}

fn full_name(msg: &Message) -> String {
    if let Some(user) = &msg.from {
        return user.full_name();
    }
    match (msg.chat.first_name(), msg.chat.last_name()) {
        (Some(first), Some(last)) => format!("{} {}", first, last),
        (Some(first), None) => first.to_string(),
        (None, Some(last)) => last.to_string(),
        (None, None) => msg.chat.username().unwrap_or_default().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    const LAN: i64 = 5;

    fn message(chat: serde_json::Value, with_sender: bool, text: &str) -> Message {
        let mut raw = json!({
            "message_id": 1,
            "date": 1714600000,
            "chat": chat,
            "text": text,
        });
        if with_sender {
            raw["from"] = json!({
                "id": LAN,
                "is_bot": false,
                "first_name": "Lan",
                "last_name": "Do",
            });
        }
        serde_json::from_value(raw).unwrap()
    }

    fn private_chat(id: i64) -> serde_json::Value {
        json!({ "id": id, "type": "private", "first_name": "Lan", "last_name": "Do" })
    }

    fn supergroup() -> serde_json::Value {
        json!({ "id": -1001234567890i64, "type": "supergroup", "title": "Weather fans" })
    }

    #[test]
    fn test_names_come_from_sender_in_groups() {
        let msg = message(supergroup(), true, "/weather");
        assert_eq!(first_name(&msg), "Lan");
        assert_eq!(full_name(&msg), "Lan Do");
        assert_eq!(
            messages::weather_menu(first_name(&msg)),
            "<b>Hello Lan! 🙋 </b>\n\n🌦️ Let see how is the weather today?"
        );
    }

    #[test]
    fn test_names_fall_back_to_private_chat() {
        let msg = message(private_chat(LAN), false, "hi");
        assert_eq!(first_name(&msg), "Lan");
        assert_eq!(full_name(&msg), "Lan Do");
    }

    #[tokio::test]
    async fn test_only_private_chats_are_registered_once() {
        let state = StateStore::new(Arc::new(InMemoryStore::new()));

        let group = message(supergroup(), true, "hello");
        assert!(!register_chat(&state, &group.chat).await.unwrap());
        assert!(state.subscribers().await.unwrap().is_empty());

        let first = message(private_chat(LAN), true, "hello");
        assert!(register_chat(&state, &first.chat).await.unwrap());

        // A known chat gets no second welcome, commands included
        let again = message(private_chat(LAN), true, "/weather");
        assert!(!register_chat(&state, &again.chat).await.unwrap());

        let command_first = message(private_chat(6), true, "/random_choice a b");
        assert!(register_chat(&state, &command_first.chat).await.unwrap());

        assert_eq!(
            state.subscribers().await.unwrap().into_iter().collect::<Vec<_>>(),
            vec![LAN, 6]
        );
    }

    #[test]
    fn test_pick_choice() {
        let mut rng = StdRng::seed_from_u64(7);
        let pick = pick_choice("tea  coffee\tbeer", &mut rng).unwrap();
        assert!(["tea", "coffee", "beer"].contains(&pick));
        assert_eq!(pick_choice("   ", &mut rng), None);
        assert_eq!(pick_choice("", &mut rng), None);
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!(
            Command::parse("/weather", "bumo_bot").unwrap(),
            Command::Weather
        );
        assert_eq!(
            Command::parse("/random_choice a b", "bumo_bot").unwrap(),
            Command::RandomChoice("a b".into())
        );
        assert!(Command::parse("/forecast", "bumo_bot").is_err());
    }
}
