use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile, MessageId, ReplyParameters};
use video_relay_runtime::ChatTransport;

/// Chat transport backed by the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramChatTransport {
    bot: Bot,
}

impl TelegramChatTransport {
    /// Wrap a bot instance.
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatTransport for TelegramChatTransport {
    async fn send_indicator(&self, chat_id: i64) -> Result<()> {
        self.bot
            .send_chat_action(ChatId(chat_id), ChatAction::UploadVideo)
            .await?;
        Ok(())
    }

    async fn send_video(&self, chat_id: i64, reply_to: i32, path: &Path) -> Result<()> {
        self.bot
            .send_video(ChatId(chat_id), InputFile::file(path.to_path_buf()))
            .supports_streaming(true)
            .reply_parameters(ReplyParameters::new(MessageId(reply_to)))
            .await?;
        Ok(())
    }

    async fn send_notice(&self, chat_id: i64, reply_to: i32, text: &str) -> Result<()> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .reply_parameters(ReplyParameters::new(MessageId(reply_to)))
            .await?;
        Ok(())
    }
}
