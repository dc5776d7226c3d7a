#![deny(missing_docs)]
//! Video relay core library.
//!
//! Settings, URL entity parsing, retry policy, artifact handling and the
//! yt-dlp extractor shared by the relay runtime and its transports.

/// Downloaded media files and cleanup.
pub mod artifact;
/// Configuration management.
pub mod config;
/// URL extraction from message entities.
pub mod entities;
/// Media extraction capability and the yt-dlp implementation.
pub mod extractor;
/// Bounded retry state machine.
pub mod retry;
