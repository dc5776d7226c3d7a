//! Configuration and settings management
//!
//! Loads relay settings from config files and environment variables and
//! defines the default limits used by the relay.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Largest artifact (in bytes) that will be relayed back to the chat (45 MiB).
pub const MAX_FILE_SIZE: u64 = 45 * 1024 * 1024;
/// Attempts per operation (download or upload) for a single URL.
pub const MAX_RETRIES: u32 = 3;
/// Interval between "uploading video" chat actions, in milliseconds.
pub const KEEPALIVE_INTERVAL_MS: u64 = 4_500;
/// Telegram hides a chat action after this many milliseconds.
pub const CHAT_ACTION_EXPIRY_MS: u64 = 5_000;

/// Default working directory for downloaded artifacts.
pub const DEFAULT_DOWNLOAD_DIR: &str = "downloads";
/// Default location of the optional cookie jar.
pub const DEFAULT_COOKIES_FILE: &str = "cookies.txt";
/// Default extraction executable.
pub const DEFAULT_YTDLP_BIN: &str = "yt-dlp";

/// Relay settings shared by the extractor and the orchestrator.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RelaySettings {
    /// Working directory for transient artifacts
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    /// Cookie jar handed to yt-dlp when it exists on disk
    #[serde(default = "default_cookies_file")]
    pub cookies_file: PathBuf,
    /// yt-dlp executable name or path
    #[serde(default = "default_ytdlp_bin")]
    pub ytdlp_bin: String,
    /// Byte ceiling for relayed artifacts
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Attempts per download or upload
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Interval between chat actions while downloading
    #[serde(default = "default_keepalive_interval_ms")]
    pub keepalive_interval_ms: u64,
    /// Reply with a short notice when a URL is abandoned
    #[serde(default)]
    pub notify_on_failure: bool,
}

fn default_download_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DOWNLOAD_DIR)
}

fn default_cookies_file() -> PathBuf {
    PathBuf::from(DEFAULT_COOKIES_FILE)
}

fn default_ytdlp_bin() -> String {
    DEFAULT_YTDLP_BIN.to_string()
}

const fn default_max_file_size() -> u64 {
    MAX_FILE_SIZE
}

const fn default_max_retries() -> u32 {
    MAX_RETRIES
}

const fn default_keepalive_interval_ms() -> u64 {
    KEEPALIVE_INTERVAL_MS
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            cookies_file: default_cookies_file(),
            ytdlp_bin: default_ytdlp_bin(),
            max_file_size: MAX_FILE_SIZE,
            max_retries: MAX_RETRIES,
            keepalive_interval_ms: KEEPALIVE_INTERVAL_MS,
            notify_on_failure: false,
        }
    }
}

/// Build the layered configuration used by every crate in the workspace.
///
/// Sources, later ones winning: `config/default`, `config/{RUN_MODE}`,
/// `config/local`, `APP__*` variables, then plain environment variables.
///
/// # Errors
///
/// Returns a `ConfigError` if a present source cannot be parsed.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Not checked into git
        .add_source(File::with_name("config/local").required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        // ignore_empty treats empty env vars as unset
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

impl RelaySettings {
    /// Load relay settings from files and the environment.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or a value is out of range.
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_config(build_config()?)
    }

    /// Deserialize and validate settings from an already built `Config`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if deserialization or validation fails.
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let settings: Self = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check invariants the relay depends on.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Message` describing the first violated rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::Message(
                "max_retries must be at least 1".to_string(),
            ));
        }
        if self.max_file_size == 0 {
            return Err(ConfigError::Message(
                "max_file_size must be greater than zero".to_string(),
            ));
        }
        if self.keepalive_interval_ms == 0 || self.keepalive_interval_ms >= CHAT_ACTION_EXPIRY_MS
        {
            return Err(ConfigError::Message(format!(
                "keepalive_interval_ms must be between 1 and {} (got {})",
                CHAT_ACTION_EXPIRY_MS - 1,
                self.keepalive_interval_ms
            )));
        }
        Ok(())
    }

    /// Interval between keep-alive chat actions.
    #[must_use]
    pub const fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }
}
