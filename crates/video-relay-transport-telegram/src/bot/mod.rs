/// Message handlers and entity conversion
pub mod handlers;
/// Telegram implementation of the relay's chat transport
pub mod transport;

pub use transport::TelegramChatTransport;
