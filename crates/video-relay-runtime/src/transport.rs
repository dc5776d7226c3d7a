//! Transport-agnostic view of the chat the relay talks to.

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use video_relay_core::entities::{extract_urls, TextEntity};

/// An inbound chat message, reduced to what the relay needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Chat the message arrived in
    pub chat_id: i64,
    /// Identifier of the message inside its chat
    pub message_id: i32,
    /// Message text
    pub text: String,
    /// Entity annotations over `text`
    pub entities: Vec<TextEntity>,
}

impl InboundMessage {
    /// URLs annotated in the message, in entity order.
    #[must_use]
    pub fn urls(&self) -> Vec<String> {
        extract_urls(&self.text, &self.entities)
    }
}

/// Outbound chat operations used by the relay.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatTransport: Send + Sync + 'static {
    /// Show the "uploading video" indicator in `chat_id`.
    async fn send_indicator(&self, chat_id: i64) -> Result<()>;

    /// Upload the file at `path` as a video replying to `reply_to`.
    async fn send_video(&self, chat_id: i64, reply_to: i32, path: &Path) -> Result<()>;

    /// Send a short text reply to `reply_to`.
    async fn send_notice(&self, chat_id: i64, reply_to: i32, text: &str) -> Result<()>;
}
