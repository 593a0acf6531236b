//! iris-update distribution server entry point.
//!
//! Initialises tracing, loads configuration from `IRIS_UPDATE_*` environment
//! variables, reads the Release Store once, and serves `/latest` and
//! `/download/{version}`. `SIGHUP` reloads the store without a restart.

use std::sync::Arc;

use anyhow::{Context, Result};
use iris_update_common::ServerConfig;
use iris_update_server::{AppState, router};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config: ServerConfig = envy::prefixed("IRIS_UPDATE_")
        .from_env()
        .context("failed to load config from IRIS_UPDATE_* env vars")?;

    tracing::info!(
        listen_addr = %config.listen_addr,
        state_file = %config.state_file.display(),
        releases_dir = %config.releases_dir.display(),
        "configuration loaded",
    );

    let state = Arc::new(AppState::load(&config).context("failed to load release store")?);
    match &state.snapshot().latest {
        Some(release) => tracing::info!(version = release.version, "advertising release"),
        None => tracing::warn!("no release published yet"),
    }

    #[cfg(unix)]
    spawn_reload_on_hangup(state.clone())?;

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .context("failed to bind TCP listener")?;

    tracing::info!("update server ready on http://{}", config.listen_addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("update server shut down");
    Ok(())
}

/// Reload the Release Store whenever the process receives `SIGHUP`.
#[cfg(unix)]
fn spawn_reload_on_hangup(state: Arc<AppState>) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup()).context("failed to install SIGHUP handler")?;
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            let state = state.clone();
            match tokio::task::spawn_blocking(move || state.reload()).await {
                Ok(Ok(Some(version))) => tracing::info!(version, "release store reloaded"),
                Ok(Ok(None)) => tracing::info!("release store reloaded, nothing published"),
                Ok(Err(e)) => tracing::error!(error = %e, "reload failed, keeping previous snapshot"),
                Err(e) => tracing::error!(error = %e, "reload task panicked"),
            }
        }
    });
    Ok(())
}

/// Wait for SIGINT (Ctrl-C) for graceful shutdown.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("received shutdown signal");
}
