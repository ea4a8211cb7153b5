// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chatdesk: real-time relay between website visitors and a support desk.

pub mod config;
pub mod context;
pub mod error;
pub mod handler;
pub mod health;
pub mod outbound;
pub mod presence;
pub mod protocol;
pub mod registry;
pub mod sessions;
pub mod state;
pub mod store;
pub mod supervisor;
pub mod transport;

#[cfg(test)]
pub mod test_support;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::RelayConfig;
use crate::state::RelayState;
use crate::store::SqliteStore;
use crate::transport::build_router;

/// Initialize the global tracing subscriber from config. Safe to call twice.
pub fn init_tracing(config: &RelayConfig) {
    use tracing_subscriber::fmt;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match config.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

/// Run the relay until SIGTERM/SIGINT.
pub async fn run(config: RelayConfig) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    let shutdown = CancellationToken::new();

    let store = SqliteStore::open(&config.db_path, config.support_id.clone())?;
    info!(db = %config.db_path.display(), "history store opened");

    let state = RelayState::new(config.relay_settings(), Arc::new(store), shutdown.clone())
        .with_auth_token(config.auth_token.clone());

    spawn_signal_handler(shutdown);

    let listener = TcpListener::bind(&addr).await?;
    info!("chatdesk listening on {addr}");
    serve(listener, Arc::new(state)).await
}

/// Serve the relay on an already-bound listener until `state.shutdown` fires.
pub async fn serve(listener: TcpListener, state: Arc<RelayState>) -> anyhow::Result<()> {
    let shutdown = state.shutdown.clone();
    let router = build_router(state);
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;
    info!("chatdesk stopped");
    Ok(())
}

fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        let mut sigint =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

        tokio::select! {
            _ = async {
                if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
            } => {
                info!("received SIGTERM");
            }
            _ = async {
                if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
            } => {
                info!("received SIGINT");
            }
        }
        shutdown.cancel();
    });
}
