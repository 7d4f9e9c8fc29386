use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use tracing::debug;

use common::{Error, Notifier, Result};

/// Sends every notification to a single Telegram chat.
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramNotifier {
    pub fn new(bot_token: impl Into<String>, chat_id: &str) -> Result<Self> {
        Ok(Self::with_bot(Bot::new(bot_token), parse_chat_id(chat_id)?))
    }

    pub fn with_bot(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        self.bot
            .send_message(self.chat_id, message)
            .disable_web_page_preview(true)
            .await
            .map_err(|e| Error::Telegram(format!("send failed: {e}")))?;
        debug!(chat_id = self.chat_id.0, "Telegram message sent");
        Ok(())
    }
}

/// Telegram chat ids are signed integers; groups are negative.
pub fn parse_chat_id(raw: &str) -> Result<ChatId> {
    raw.trim()
        .parse::<i64>()
        .map(ChatId)
        .map_err(|_| Error::Config(format!("TELEGRAM_CHAT_ID must be an integer, got '{raw}'")))
}
