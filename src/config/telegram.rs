// src/config/telegram.rs
use serde::{Deserialize, Serialize};

use crate::notify::ChatId;

fn default_bot_token() -> String {
    "ENV".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// "ENV" means: read from TELEGRAM_BOT_TOKEN
    #[serde(default = "default_bot_token")]
    pub bot_token: String,
    /// Recipients subscribed at startup.
    #[serde(default)]
    pub chat_ids: Vec<ChatId>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: default_bot_token(),
            chat_ids: Vec::new(),
        }
    }
}

impl TelegramConfig {
    /// `None` when no token is configured; notifications are then disabled.
    pub fn resolve_token(&self) -> Option<String> {
        let raw = self.bot_token.trim();
        let token = if raw.eq_ignore_ascii_case("env") {
            std::env::var("TELEGRAM_BOT_TOKEN").ok()?
        } else {
            raw.to_string()
        };
        (!token.trim().is_empty()).then_some(token)
    }
}
