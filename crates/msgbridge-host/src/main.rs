//! msgbridge host binary.
//!
//! Speaks newline-delimited JSON envelopes on stdin/stdout; logs go to stderr.
//! Usage: `msgbridge-host [config.yaml]`

use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

use msgbridge_host::app_state::AppState;
use msgbridge_host::config::{self, BridgeConfig};
use msgbridge_host::transport::LineChannel;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = match std::env::args().nth(1) {
        Some(path) => config::load_from_file(&path)?,
        None => BridgeConfig::default(),
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.logging.filter))?;
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let state = AppState::new(cfg)?;
    let channel = LineChannel::spawn(
        tokio::io::stdin(),
        tokio::io::stdout(),
        state.cfg().host.max_message_bytes,
    );
    state.protocol().attach(channel.clone());
    let watcher = state.spawn_watchers();

    tracing::info!(
        types = ?state.protocol().registered_types(),
        workspace_root = ?state.protocol().context().workspace_root(),
        "msgbridge-host ready"
    );

    tokio::select! {
        _ = channel.closed() => tracing::info!("input closed, shutting down"),
        _ = shutdown_signal() => tracing::info!("signal received, shutting down"),
    }

    let grace = Duration::from_millis(state.cfg().host.shutdown_grace_ms);
    if tokio::time::timeout(grace, state.protocol().wait_idle()).await.is_err() {
        tracing::warn!(?grace, "in-flight handlers still running at shutdown");
    }
    if let Some(w) = watcher {
        w.abort();
    }
    state.protocol().detach();
    channel.shutdown().await;
    tracing::debug!(metrics = %state.protocol().metrics().render(), "final protocol metrics");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
