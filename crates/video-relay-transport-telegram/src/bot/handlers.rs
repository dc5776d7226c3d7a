use crate::runner::TelegramRelay;
use teloxide::types::{Message, MessageEntity, MessageEntityKind};
use tracing::{debug, info};
use video_relay_core::entities::{EntityKind, TextEntity};
use video_relay_runtime::InboundMessage;

/// Convert Telegram entities into the relay's entity model.
#[must_use]
pub fn to_text_entities(entities: &[MessageEntity]) -> Vec<TextEntity> {
    entities
        .iter()
        .map(|e| TextEntity {
            kind: match e.kind {
                MessageEntityKind::Url => EntityKind::Url,
                _ => EntityKind::Other,
            },
            offset: e.offset,
            length: e.length,
        })
        .collect()
}

/// Returns `true` if the message text carries at least one URL entity.
#[must_use]
pub fn has_url_entities(msg: &Message) -> bool {
    msg.text().is_some()
        && msg
            .entities()
            .is_some_and(|entities| entities.iter().any(|e| e.kind == MessageEntityKind::Url))
}

/// Reduce a Telegram message to the relay's inbound model.
///
/// Returns `None` for messages without text.
#[must_use]
pub fn inbound_message(msg: &Message) -> Option<InboundMessage> {
    let text = msg.text()?;
    Some(InboundMessage {
        chat_id: msg.chat.id.0,
        message_id: msg.id.0,
        text: text.to_string(),
        entities: to_text_entities(msg.entities().unwrap_or_default()),
    })
}

/// Relay every URL in `msg` back into its chat.
pub async fn relay_message(relay: &TelegramRelay, msg: &Message) {
    let Some(inbound) = inbound_message(msg) else {
        debug!(chat_id = msg.chat.id.0, "Ignoring message without text");
        return;
    };

    let reports = relay.process_message(&inbound).await;
    let delivered = reports.iter().filter(|r| r.outcome.is_delivered()).count();
    info!(
        chat_id = inbound.chat_id,
        message_id = inbound.message_id,
        urls = reports.len(),
        delivered,
        "Message processed"
    );
}
