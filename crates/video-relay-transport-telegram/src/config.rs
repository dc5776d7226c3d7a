//! Telegram transport settings.

use config::{Config, ConfigError};
use serde::Deserialize;
use std::sync::Arc;
use video_relay_core::config::{build_config, RelaySettings};

/// Telegram transport settings loaded from environment variables.
#[derive(Clone, Default)]
pub struct TelegramSettings {
    /// Telegram Bot API token.
    pub bot_token: String,
}

impl std::fmt::Debug for TelegramSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSettings")
            .field("bot_token", &"[TELEGRAM_TOKEN]")
            .finish()
    }
}

/// Raw keys as they appear in the environment. `BOT_TOKEN` wins over `TELEGRAM_TOKEN`.
#[derive(Deserialize)]
struct RawTelegramSettings {
    bot_token: Option<String>,
    telegram_token: Option<String>,
}

impl TelegramSettings {
    /// Create new settings by loading from environment and files.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or no token is configured.
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_config(build_config()?)
    }

    /// Extract Telegram settings from an already built `Config`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if neither token key holds a value.
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let raw: RawTelegramSettings = config.try_deserialize()?;
        let bot_token = raw
            .bot_token
            .into_iter()
            .chain(raw.telegram_token)
            .map(|token| token.trim().to_string())
            .find(|token| !token.is_empty())
            .ok_or_else(|| ConfigError::NotFound("bot_token".to_string()))?;
        Ok(Self { bot_token })
    }
}

/// Combined settings used by the Telegram transport layer.
#[derive(Clone, Debug)]
pub struct BotSettings {
    /// Relay settings shared with the extractor and orchestrator.
    pub relay: Arc<RelaySettings>,
    /// Telegram-specific settings.
    pub telegram: Arc<TelegramSettings>,
}

impl BotSettings {
    /// Create a new combined settings bundle.
    #[must_use]
    pub fn new(relay: RelaySettings, telegram: TelegramSettings) -> Self {
        Self {
            relay: Arc::new(relay),
            telegram: Arc::new(telegram),
        }
    }
}
