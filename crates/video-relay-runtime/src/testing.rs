//! Test doubles for the relay runtime.
//!
//! `RecordingTransport` keeps an ordered trace of every outbound call so tests
//! can assert on ordering; `ScriptedExtractor` plays back a fixed list of
//! extraction results and creates real files for the successful ones.

use crate::transport::ChatTransport;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;
use video_relay_core::artifact::Artifact;
use video_relay_core::extractor::{ExtractError, Extractor};

/// One outbound call observed by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Chat action sent to a chat
    Indicator(i64),
    /// Video upload that succeeded
    Video {
        chat_id: i64,
        reply_to: i32,
        file_name: String,
        /// Whether the file was on disk when the upload was attempted
        existed: bool,
    },
    /// Text notice
    Notice { chat_id: i64, reply_to: i32 },
    /// Test-inserted marker
    Marker(&'static str),
}

/// Transport that records every call and can fail uploads on demand.
#[derive(Default)]
pub struct RecordingTransport {
    events: Mutex<Vec<TransportEvent>>,
    upload_failures: AtomicU32,
    upload_attempts: AtomicU32,
}

impl RecordingTransport {
    /// Fail the next `count` uploads.
    pub fn failing_uploads(count: u32) -> Self {
        Self {
            upload_failures: AtomicU32::new(count),
            ..Self::default()
        }
    }

    fn push(&self, event: TransportEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    /// Insert a marker into the trace.
    pub fn mark(&self, label: &'static str) {
        self.push(TransportEvent::Marker(label));
    }

    /// Snapshot of the trace.
    pub fn events(&self) -> Vec<TransportEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Indicators sent to `chat_id`.
    pub fn indicator_count(&self, chat_id: i64) -> usize {
        self.events()
            .iter()
            .filter(|e| **e == TransportEvent::Indicator(chat_id))
            .count()
    }

    /// Successful video uploads.
    pub fn videos(&self) -> Vec<TransportEvent> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, TransportEvent::Video { .. }))
            .collect()
    }

    /// Upload attempts, successful or not.
    pub fn upload_attempts(&self) -> u32 {
        self.upload_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_indicator(&self, chat_id: i64) -> Result<()> {
        self.push(TransportEvent::Indicator(chat_id));
        Ok(())
    }

    async fn send_video(&self, chat_id: i64, reply_to: i32, path: &Path) -> Result<()> {
        self.upload_attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.upload_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.upload_failures.store(remaining - 1, Ordering::SeqCst);
            anyhow::bail!("simulated upload failure");
        }

        self.push(TransportEvent::Video {
            chat_id,
            reply_to,
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            existed: path.exists(),
        });
        Ok(())
    }

    async fn send_notice(&self, chat_id: i64, reply_to: i32, _text: &str) -> Result<()> {
        self.push(TransportEvent::Notice { chat_id, reply_to });
        Ok(())
    }
}

/// One scripted extraction result.
#[derive(Debug, Clone, Copy)]
pub enum Step {
    /// Produce a file of this many bytes
    File(u64),
    /// Fail without producing media
    NoMedia,
    /// Fail with a retryable error
    Transient,
}

/// Extractor replaying a fixed script of results.
pub struct ScriptedExtractor {
    dir: PathBuf,
    steps: Mutex<VecDeque<Step>>,
    delay: Duration,
    calls: AtomicU32,
    created: Mutex<Vec<PathBuf>>,
}

impl ScriptedExtractor {
    /// Play back `steps` in order, writing files into `dir`.
    pub fn new(dir: &Path, steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            dir: dir.to_path_buf(),
            steps: Mutex::new(steps.into_iter().collect()),
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
            created: Mutex::new(Vec::new()),
        }
    }

    /// Make every fetch take `delay` before resolving.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of `fetch` calls so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every file this extractor produced.
    pub fn created(&self) -> Vec<PathBuf> {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    async fn fetch(&self, url: &str) -> Result<Artifact, ExtractError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.delay).await;
        }

        let step = self
            .steps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(Step::Transient);

        match step {
            Step::File(len) => {
                let path = self.dir.join(format!("{call}.mp4"));
                let file = std::fs::File::create(&path)
                    .map_err(|e| ExtractError::Transient(e.to_string()))?;
                file.set_len(len)
                    .map_err(|e| ExtractError::Transient(e.to_string()))?;
                self.created
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(path.clone());
                Ok(Artifact::new(path))
            }
            Step::NoMedia => Err(ExtractError::NonRetryable {
                url: url.to_string(),
                reason: "no file was downloaded".to_string(),
            }),
            Step::Transient => Err(ExtractError::Transient("connection reset".to_string())),
        }
    }
}

/// Tracing layer counting error-level events.
pub struct ErrorCounter(pub Arc<AtomicUsize>);

impl<S: Subscriber> Layer<S> for ErrorCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::ERROR {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}
