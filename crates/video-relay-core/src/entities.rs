//! URL extraction from message entity annotations.
//!
//! Chat platforms annotate message text with typed spans. Offsets and lengths
//! are expressed in UTF-16 code units, so slicing has to walk the text rather
//! than index it by bytes.

use tracing::debug;

/// Kind of an entity annotation. Only URLs matter to the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// A bare URL in the text
    Url,
    /// Any other annotation (mentions, formatting, text links, ...)
    Other,
}

/// A typed span over message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextEntity {
    /// Entity kind
    pub kind: EntityKind,
    /// Start of the span in UTF-16 code units
    pub offset: usize,
    /// Length of the span in UTF-16 code units
    pub length: usize,
}

impl TextEntity {
    /// Create a URL entity spanning `length` code units from `offset`.
    #[must_use]
    pub const fn url(offset: usize, length: usize) -> Self {
        Self {
            kind: EntityKind::Url,
            offset,
            length,
        }
    }
}

/// Returns `true` if at least one entity is a URL.
#[must_use]
pub fn has_url_entities(entities: &[TextEntity]) -> bool {
    entities.iter().any(|e| e.kind == EntityKind::Url)
}

/// Collect the text of every URL entity, in entity order.
///
/// Spans that fall outside the text or split a surrogate pair are skipped.
#[must_use]
pub fn extract_urls(text: &str, entities: &[TextEntity]) -> Vec<String> {
    entities
        .iter()
        .filter(|e| e.kind == EntityKind::Url)
        .filter_map(|e| {
            let slice = utf16_slice(text, e.offset, e.length);
            if slice.is_none() {
                debug!(
                    offset = e.offset,
                    length = e.length,
                    "Skipping URL entity with invalid span"
                );
            }
            slice
        })
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect()
}

/// Slice `text` by a UTF-16 offset/length pair.
fn utf16_slice(text: &str, offset: usize, length: usize) -> Option<&str> {
    let end = offset.checked_add(length)?;
    let mut start_byte = None;
    let mut end_byte = None;
    let mut units = 0usize;

    for (byte_idx, ch) in text.char_indices() {
        if units == offset {
            start_byte = Some(byte_idx);
        }
        if units == end {
            end_byte = Some(byte_idx);
            break;
        }
        units += ch.len_utf16();
    }

    if units == offset && start_byte.is_none() {
        start_byte = Some(text.len());
    }
    if units == end && end_byte.is_none() {
        end_byte = Some(text.len());
    }

    match (start_byte, end_byte) {
        (Some(start), Some(end)) if start <= end => text.get(start..end),
        _ => None,
    }
}
