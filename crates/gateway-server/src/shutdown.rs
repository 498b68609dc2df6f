//! Shutdown signal handling.
//!
//! The server stops accepting connections when a signal arrives and gives
//! in-flight requests, open streams included, a bounded drain window.

use std::future::Future;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Resolve when a shutdown signal arrives, returning its name
///
/// A handler that cannot be installed is logged and never fires; the
/// remaining ones still do.
pub async fn shutdown_signal() -> String {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        "ctrl+c"
    };

    #[cfg(unix)]
    let sigterm = unix_signal(signal::unix::SignalKind::terminate(), "sigterm");
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<&str>();

    let signal_name = tokio::select! {
        name = ctrl_c => name,
        name = sigterm => name,
    };

    info!(signal = signal_name, "Received shutdown signal");
    signal_name.to_string()
}

#[cfg(unix)]
async fn unix_signal(kind: signal::unix::SignalKind, name: &'static str) -> &'static str {
    match signal::unix::signal(kind) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            error!(error = %e, signal = name, "Failed to install signal handler");
            std::future::pending::<()>().await;
        }
    }
    name
}

/// Pairs a graceful-shutdown trigger with a drain deadline
#[derive(Debug)]
pub struct DrainGuard {
    triggered: watch::Receiver<bool>,
    timeout: Duration,
}

impl DrainGuard {
    /// Wrap `signal` so that resolving it also starts the drain clock
    pub fn new<F>(signal: F, timeout: Duration) -> (impl Future<Output = ()> + Send + 'static, Self)
    where
        F: Future<Output = String> + Send + 'static,
    {
        let (tx, rx) = watch::channel(false);
        let trigger = async move {
            let reason = signal.await;
            info!(reason = %reason, "Stopping listener, draining connections");
            let _ = tx.send(true);
        };
        (
            trigger,
            Self {
                triggered: rx,
                timeout,
            },
        )
    }

    /// Resolve once the drain window has elapsed after the trigger fired
    pub async fn expired(mut self) {
        if self.triggered.wait_for(|fired| *fired).await.is_err() {
            // Trigger dropped without firing; the server is already done
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(self.timeout).await;
        warn!(
            timeout_secs = self.timeout.as_secs(),
            "Drain timeout reached, closing remaining connections"
        );
    }
}
