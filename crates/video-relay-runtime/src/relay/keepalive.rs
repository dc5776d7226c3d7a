//! "Uploading video" keep-alive while a download is in flight.
//!
//! The signaler and its owner share only a [`CancellationToken`]. Stopping
//! cancels the token and then awaits the task, so once [`KeepAlive::stop`]
//! returns no further indicator can be sent.

use crate::transport::ChatTransport;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Handle to a running keep-alive task.
pub struct KeepAlive {
    token: CancellationToken,
    handle: Option<JoinHandle<u32>>,
}

impl KeepAlive {
    /// Spawn a keep-alive loop targeting `chat_id`.
    pub fn start<T: ChatTransport>(transport: Arc<T>, chat_id: i64, interval: Duration) -> Self {
        let token = CancellationToken::new();
        let handle = tokio::spawn(run_keepalive_loop(
            transport,
            chat_id,
            interval,
            token.clone(),
        ));
        Self {
            token,
            handle: Some(handle),
        }
    }

    /// Signal the loop to stop and wait for it to exit.
    ///
    /// Returns the number of indicators that were sent.
    pub async fn stop(mut self) -> u32 {
        self.token.cancel();
        let Some(handle) = self.handle.take() else {
            return 0;
        };
        match handle.await {
            Ok(sent) => sent,
            Err(e) => {
                warn!(error = %e, "Keep-alive task ended abnormally");
                0
            }
        }
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        // Reached without stop() only when the owner unwinds; the loop still exits.
        self.token.cancel();
    }
}

/// Send indicators every `interval` until `token` is cancelled or a send fails.
async fn run_keepalive_loop<T: ChatTransport + ?Sized>(
    transport: Arc<T>,
    chat_id: i64,
    interval: Duration,
    token: CancellationToken,
) -> u32 {
    let mut sent = 0;

    while !token.is_cancelled() {
        if let Err(e) = transport.send_indicator(chat_id).await {
            warn!(chat_id, error = %e, "Chat action failed, stopping keep-alive");
            break;
        }
        sent += 1;

        tokio::select! {
            () = token.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }
    }

    debug!(chat_id, sent, "Keep-alive stopped");
    sent
}
