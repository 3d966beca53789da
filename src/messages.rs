//! User-facing texts and the message shape handed to the bot layer.

use crate::scrapers::ExtractOutcome;

/// Callback data (and label) of the menu button.
pub const GET_LATEST_POST_BUTTON: &str = "fb/thoitietHN";

/// Label of the button linking to the post.
pub const GO_TO_POST_LABEL: &str = "Go to Post";

pub const LATEST_POST_FAILURE: &str =
    "<b>🙇 Sorry, I couldn't find the latest post from Thời Tiết Hà Nội</b>";

pub const RANDOM_CHOICE_USAGE: &str = "🙏 You need to provide a list of choices to pick from.";

/// A button opening an external URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkButton {
    pub label: String,
    pub url: String,
}

/// HTML text plus an optional link button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostMessage {
    pub text: String,
    pub button: Option<LinkButton>,
}

impl PostMessage {
    /// Success links to the post; anything else is the static apology.
    pub fn from_outcome(outcome: &ExtractOutcome) -> Self {
        match outcome {
            ExtractOutcome::Found(url) => Self {
                text: latest_post_success(url),
                button: Some(LinkButton {
                    label: GO_TO_POST_LABEL.to_string(),
                    url: url.clone(),
                }),
            },
            ExtractOutcome::NotFound | ExtractOutcome::Fault(_) => Self::failure(),
        }
    }

    pub fn failure() -> Self {
        Self {
            text: LATEST_POST_FAILURE.to_string(),
            button: None,
        }
    }
}

pub fn latest_post_success(url: &str) -> String {
    format!(
        "<a href=\"{}\"><b>🔗 Latest post from Thời Tiết Hà Nội</b></a>",
        html_escape(url)
    )
}

pub fn weather_menu(first_name: &str) -> String {
    format!(
        "<b>Hello {}! 🙋 </b>\n\n🌦️ Let see how is the weather today?",
        html_escape(first_name)
    )
}

pub fn welcome(full_name: &str) -> String {
    format!(
        "Welcome {}. Me is Bumo chatbot. Glad to meet you!",
        full_name
    )
}

pub fn random_choice(pick: &str) -> String {
    format!("🎲 The random choice is: {}", pick)
}

/// Escape text for Telegram's HTML parse mode.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
