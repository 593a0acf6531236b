//! Process shutdown signals for the long-running agent.
//!
//! Handlers are registered when [`ShutdownSignal::install`] returns, not when
//! the future is first polled. Until then the default action for `SIGTERM`
//! is to kill the process.

use anyhow::{Context, Result};

/// Registered Ctrl-C and, on unix, `SIGTERM` handlers.
pub struct ShutdownSignal {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl ShutdownSignal {
    /// Register the handlers. Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if a handler cannot be registered.
    #[cfg(unix)]
    pub fn install() -> Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};
        Ok(Self {
            interrupt: signal(SignalKind::interrupt()).context("listening for Ctrl-C")?,
            terminate: signal(SignalKind::terminate()).context("listening for SIGTERM")?,
        })
    }

    /// Register the handlers. Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Never fails off unix; Ctrl-C errors surface in [`Self::recv`].
    #[cfg(not(unix))]
    pub fn install() -> Result<Self> {
        Ok(Self {})
    }

    /// Resolve once a shutdown signal has arrived, including one delivered
    /// between [`Self::install`] and the first poll.
    #[cfg(unix)]
    pub async fn recv(mut self) {
        tokio::select! {
            _ = self.interrupt.recv() => {}
            _ = self.terminate.recv() => {}
        }
        tracing::info!("received shutdown signal");
    }

    #[cfg(not(unix))]
    pub async fn recv(self) {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        tracing::info!("received shutdown signal");
    }
}
