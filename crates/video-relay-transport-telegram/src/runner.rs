use crate::bot;
use crate::bot::TelegramChatTransport;
use crate::config::BotSettings;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing::info;
use video_relay_core::extractor::YtDlpExtractor;
use video_relay_runtime::{RelayPolicy, UrlRelay};

/// Relay wired to yt-dlp and the Telegram Bot API.
pub type TelegramRelay = UrlRelay<YtDlpExtractor, TelegramChatTransport>;

/// Run the Telegram transport runtime.
pub async fn run_bot(settings: Arc<BotSettings>) {
    let bot = Bot::new(settings.telegram.bot_token.clone());
    let relay = Arc::new(init_relay(&settings, bot.clone()));
    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![relay])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn init_relay(settings: &BotSettings, bot: Bot) -> TelegramRelay {
    let policy = RelayPolicy::from_settings(&settings.relay);
    info!(
        download_dir = %settings.relay.download_dir.display(),
        max_file_size = policy.max_file_size,
        max_attempts = policy.max_attempts,
        keepalive_ms = settings.relay.keepalive_interval_ms,
        "Initializing URL relay"
    );

    UrlRelay::new(
        Arc::new(YtDlpExtractor::new(&settings.relay)),
        Arc::new(TelegramChatTransport::new(bot)),
        policy,
    )
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message()
        .filter(|msg: Message| bot::handlers::has_url_entities(&msg))
        .endpoint(handle_url_message)
}

async fn handle_url_message(
    msg: Message,
    relay: Arc<TelegramRelay>,
) -> Result<(), teloxide::RequestError> {
    bot::handlers::relay_message(&relay, &msg).await;
    respond(())
}
