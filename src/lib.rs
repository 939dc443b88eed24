pub mod auth;
pub mod course;
pub mod db;
pub mod error;
pub mod events;
pub mod middleware;
pub mod notification;
pub mod routes;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,learning_notifications=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Flips to `true` on Ctrl-C.
pub fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {:?}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = tx.send(true);
    });
    rx
}
