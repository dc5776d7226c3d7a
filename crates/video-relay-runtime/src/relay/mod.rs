//! URL relay orchestration.
//!
//! For every URL in a message: download with retries while a keep-alive
//! indicator runs, enforce the size ceiling, upload with retries, and remove
//! the local file. URLs are handled one at a time and a failure on one URL
//! never affects the next.

mod keepalive;

pub use keepalive::KeepAlive;

use crate::transport::{ChatTransport, InboundMessage};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use video_relay_core::artifact::Artifact;
use video_relay_core::config::RelaySettings;
use video_relay_core::extractor::Extractor;
use video_relay_core::retry::{run_with_retry, Attempt, RetryOutcome};

/// Limits applied to every relayed URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayPolicy {
    /// Attempts per download and per upload
    pub max_attempts: u32,
    /// Largest file (bytes) that is uploaded
    pub max_file_size: u64,
    /// Interval between keep-alive indicators
    pub keepalive_interval: Duration,
    /// Reply with a notice when a URL is abandoned
    pub notify_on_failure: bool,
}

impl RelayPolicy {
    /// Build the policy from relay settings.
    #[must_use]
    pub const fn from_settings(settings: &RelaySettings) -> Self {
        Self {
            max_attempts: settings.max_retries,
            max_file_size: settings.max_file_size,
            keepalive_interval: settings.keepalive_interval(),
            notify_on_failure: settings.notify_on_failure,
        }
    }
}

impl Default for RelayPolicy {
    fn default() -> Self {
        Self::from_settings(&RelaySettings::default())
    }
}

/// How processing of a single URL ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The video was sent to the chat
    Delivered {
        /// Upload attempts used
        upload_attempts: u32,
    },
    /// The extractor found nothing to download
    NoMedia,
    /// Every download attempt failed
    DownloadFailed {
        /// Download attempts used
        attempts: u32,
    },
    /// The download exceeded the size ceiling
    TooLarge {
        /// Size of the rejected file in bytes
        size: u64,
    },
    /// Every upload attempt failed
    UploadFailed {
        /// Upload attempts used
        attempts: u32,
    },
}

impl RelayOutcome {
    /// Returns `true` if a video reached the chat.
    #[must_use]
    pub const fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }

    fn failure_notice(&self, max_file_size: u64) -> Option<String> {
        match self {
            Self::Delivered { .. } => None,
            Self::NoMedia => Some("No downloadable video found at this link.".to_string()),
            Self::TooLarge { .. } => Some(format!(
                "The video is larger than the {} MB limit.",
                max_file_size / (1024 * 1024)
            )),
            Self::DownloadFailed { .. } | Self::UploadFailed { .. } => {
                Some("Could not fetch the video from this link, please try again later.".to_string())
            }
        }
    }
}

/// Outcome for one URL of a processed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlReport {
    /// The URL as written in the message
    pub url: String,
    /// What happened to it
    pub outcome: RelayOutcome,
}

/// Coordinates extraction, keep-alive, size checks, upload and cleanup.
pub struct UrlRelay<E, T> {
    extractor: Arc<E>,
    transport: Arc<T>,
    policy: RelayPolicy,
}

impl<E: Extractor, T: ChatTransport> UrlRelay<E, T> {
    /// Create a relay over the given extractor and transport.
    pub const fn new(extractor: Arc<E>, transport: Arc<T>, policy: RelayPolicy) -> Self {
        Self {
            extractor,
            transport,
            policy,
        }
    }

    /// Policy in effect.
    pub const fn policy(&self) -> &RelayPolicy {
        &self.policy
    }

    /// Relay every URL in `message`, sequentially, and report each outcome.
    ///
    /// A message without URL entities is ignored.
    pub async fn process_message(&self, message: &InboundMessage) -> Vec<UrlReport> {
        let urls = message.urls();
        if urls.is_empty() {
            return Vec::new();
        }

        info!(
            chat_id = message.chat_id,
            message_id = message.message_id,
            count = urls.len(),
            "Relaying URLs from message"
        );

        let mut reports = Vec::with_capacity(urls.len());
        for url in urls {
            let outcome = self.process_url(message, &url).await;
            info!(url = %url, outcome = ?outcome, "URL processed");
            reports.push(UrlReport { url, outcome });
        }
        reports
    }

    async fn process_url(&self, message: &InboundMessage, url: &str) -> RelayOutcome {
        let keepalive = KeepAlive::start(
            Arc::clone(&self.transport),
            message.chat_id,
            self.policy.keepalive_interval,
        );
        let downloaded = self.download(url).await;
        keepalive.stop().await;

        let outcome = match downloaded {
            Ok(artifact) => {
                let outcome = self.upload(message, &artifact).await;
                artifact.discard();
                outcome
            }
            Err(outcome) => outcome,
        };

        if self.policy.notify_on_failure {
            self.notify_failure(message, outcome).await;
        }
        outcome
    }

    /// Fetch `url` and enforce the size ceiling.
    async fn download(&self, url: &str) -> Result<Artifact, RelayOutcome> {
        let fetched = run_with_retry(self.policy.max_attempts, "Download", url, |_| async move {
            match self.extractor.fetch(url).await {
                Ok(artifact) => Attempt::Succeeded(artifact),
                Err(e) if e.is_retryable() => Attempt::Retryable(e),
                Err(e) => Attempt::Terminal(e),
            }
        })
        .await;

        let (artifact, attempts) = match fetched {
            RetryOutcome::Succeeded { value, attempts } => (value, attempts),
            RetryOutcome::Abandoned { .. } => return Err(RelayOutcome::NoMedia),
            RetryOutcome::Exhausted { attempts, .. } => {
                return Err(RelayOutcome::DownloadFailed { attempts })
            }
        };

        match artifact.size().await {
            Ok(size) if size > self.policy.max_file_size => {
                warn!(
                    url = %url,
                    path = %artifact.path().display(),
                    size,
                    max = self.policy.max_file_size,
                    "File exceeds max size, skipping"
                );
                artifact.discard();
                Err(RelayOutcome::TooLarge { size })
            }
            Ok(_) => Ok(artifact),
            Err(e) => {
                warn!(url = %url, path = %artifact.path().display(), error = %e, "Downloaded file is unreadable");
                artifact.discard();
                Err(RelayOutcome::DownloadFailed { attempts })
            }
        }
    }

    /// Send the artifact as a reply to the originating message.
    async fn upload(&self, message: &InboundMessage, artifact: &Artifact) -> RelayOutcome {
        let path = artifact.path();
        let subject = path.display().to_string();

        let sent = run_with_retry(self.policy.max_attempts, "Upload", &subject, |_| async move {
            match self
                .transport
                .send_video(message.chat_id, message.message_id, path)
                .await
            {
                Ok(()) => Attempt::Succeeded(()),
                Err(e) => Attempt::Retryable(e),
            }
        })
        .await;

        match sent {
            RetryOutcome::Succeeded { attempts, .. } => RelayOutcome::Delivered {
                upload_attempts: attempts,
            },
            RetryOutcome::Abandoned { attempts, .. } | RetryOutcome::Exhausted { attempts, .. } => {
                RelayOutcome::UploadFailed { attempts }
            }
        }
    }

    async fn notify_failure(&self, message: &InboundMessage, outcome: RelayOutcome) {
        let Some(text) = outcome.failure_notice(self.policy.max_file_size) else {
            return;
        };
        if let Err(e) = self
            .transport
            .send_notice(message.chat_id, message.message_id, &text)
            .await
        {
            warn!(chat_id = message.chat_id, error = %e, "Failed to send failure notice");
        }
    }
}
