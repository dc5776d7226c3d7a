#![deny(missing_docs)]
//! Video relay runtime.
//!
//! Transport-agnostic orchestration: the chat transport capability, the
//! keep-alive signaler and the per-URL relay loop.

/// URL relay orchestration and keep-alive signaling.
pub mod relay;
/// Chat transport capability and inbound message model.
pub mod transport;

#[cfg(test)]
mod testing;

pub use relay::{KeepAlive, RelayOutcome, RelayPolicy, UrlRelay, UrlReport};
pub use transport::{ChatTransport, InboundMessage};
