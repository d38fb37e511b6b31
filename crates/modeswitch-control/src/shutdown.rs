//! Cooperative cancellation for the controller loop.
//!
//! Cancellation is single-shot: once triggered it stays triggered. Dropping
//! every trigger without firing leaves the signal pending forever.

use tokio::sync::watch;
use tracing::{info, warn};

/// Create a linked trigger and signal.
#[must_use]
pub fn channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, ShutdownSignal { rx })
}

/// Fires the shutdown signal.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Request shutdown. Repeated calls are harmless.
    pub fn trigger(&self) {
        self.tx.send_if_modified(|cancelled| {
            let changed = !*cancelled;
            *cancelled = true;
            changed
        });
    }
}

/// Observed by the controller loop.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Non-blocking check.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown has been requested.
    pub async fn cancelled(&mut self) {
        if self.rx.wait_for(|cancelled| *cancelled).await.is_err() {
            // Every trigger is gone without firing: never resolve.
            std::future::pending::<()>().await;
        }
    }

    /// A signal that fires on Ctrl-C.
    ///
    /// Spawns a background task, so it must be called inside a Tokio runtime.
    #[must_use]
    pub fn ctrl_c() -> Self {
        let (trigger, signal) = channel();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl-C, shutting down"),
                Err(e) => warn!(error = %e, "Ctrl-C handler failed, shutting down"),
            }
            trigger.trigger();
        });
        signal
    }
}
