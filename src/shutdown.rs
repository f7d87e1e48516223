//! Translation of process signals into loop cancellation.
//!
//! Signal handlers only cancel a [`CancellationToken`]. The poll loop and the
//! webhook server observe the token and unwind on their own; `main` decides
//! the exit status afterwards.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Owns the process-wide shutdown token.
#[derive(Debug, Clone, Default)]
pub struct ShutdownController {
    token: CancellationToken,
}

impl ShutdownController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle to the shutdown token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Requests shutdown.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Installs SIGINT and SIGTERM handlers that request shutdown.
    ///
    /// Handlers are registered before this returns, so installation failures
    /// surface here rather than inside the spawned task. The task exits after
    /// the first signal or once shutdown is requested some other way.
    #[cfg(unix)]
    pub fn listen_for_signals(&self) -> std::io::Result<JoinHandle<()>> {
        use tokio::signal::unix::{SignalKind, signal};

        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        let token = self.token.clone();

        Ok(tokio::spawn(async move {
            let name = tokio::select! {
                _ = token.cancelled() => return,
                _ = interrupt.recv() => "SIGINT",
                _ = terminate.recv() => "SIGTERM",
            };
            info!(signal = name, "Received signal, shutting down");
            token.cancel();
        }))
    }

    /// Installs a Ctrl-C handler that requests shutdown.
    #[cfg(not(unix))]
    pub fn listen_for_signals(&self) -> std::io::Result<JoinHandle<()>> {
        let token = self.token.clone();

        Ok(tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                result = tokio::signal::ctrl_c() => {
                    if result.is_ok() {
                        info!(signal = "ctrl-c", "Received signal, shutting down");
                    }
                    token.cancel();
                }
            }
        }))
    }
}
