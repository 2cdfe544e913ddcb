//! Graceful shutdown coordination via `CancellationToken`.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Coordinates shutdown across the listener and in-flight streams.
///
/// Streaming responses hold child tokens, so initiating shutdown also
/// cancels their upstream pumps.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Get a clone of the cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// A token cancelled with this coordinator, or on its own.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Initiate shutdown.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait for ctrl-c or SIGTERM, then initiate shutdown.
    pub async fn listen_for_signals(&self) {
        tokio::select! {
            () = signal_received() => {
                info!("shutdown signal received");
                self.shutdown();
            }
            () = self.token.cancelled() => {}
        }
    }

    /// Drive `work` to completion, giving up `timeout` after shutdown starts.
    ///
    /// Returns `None` when the drain timed out.
    pub async fn drain<F: Future>(&self, work: F, timeout: Duration) -> Option<F::Output> {
        tokio::pin!(work);
        let deadline = async {
            self.token.cancelled().await;
            tokio::time::sleep(timeout).await;
        };
        tokio::select! {
            out = &mut work => Some(out),
            () = deadline => {
                warn!("shutdown timed out after {timeout:?}, abandoning open connections");
                None
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn signal_received() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(err) => {
            warn!(error = %err, "cannot listen for SIGTERM, waiting for ctrl-c only");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn signal_received() {
    let _ = tokio::signal::ctrl_c().await;
}
