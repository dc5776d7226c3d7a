//! Media extraction: turning a URL into a local [`Artifact`].

mod ytdlp;

pub use ytdlp::YtDlpExtractor;

use crate::artifact::Artifact;
use async_trait::async_trait;
use thiserror::Error;

/// Errors returned by an [`Extractor`].
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The pipeline ran but produced no usable media for the URL.
    /// Retrying will not help.
    #[error("No downloadable video for {url}: {reason}")]
    NonRetryable {
        /// URL that was requested
        url: String,
        /// Why nothing was produced
        reason: String,
    },
    /// Any other pipeline failure (network, format negotiation, tool crash).
    #[error("Extraction failed: {0}")]
    Transient(String),
}

impl ExtractError {
    /// Returns `true` if another attempt may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Capability to download the media behind a URL.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Download the media referenced by `url` into a local file.
    async fn fetch(&self, url: &str) -> Result<Artifact, ExtractError>;
}
