//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize logging and metrics from the loaded configuration
//! - Create the shared counter store, its expiry task and the server
//! - Bind the listener last, so traffic only arrives once everything is ready
//!
//! Any startup error is fatal.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::config::GuardConfig;
use crate::http::GuardServer;
use crate::lifecycle::Shutdown;
use crate::observability;
use crate::store::MemoryStore;

/// Errors that stop the process from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid upstream address: {0}")]
    Upstream(#[from] axum::http::uri::InvalidUri),
    #[error("failed to bind listener: {0}")]
    Bind(#[from] std::io::Error),
}

/// Start every subsystem and serve until shutdown.
pub async fn run(config: GuardConfig, shutdown: &Shutdown) -> Result<(), StartupError> {
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        keywords = config.filters.sql_keywords.len(),
        rate_limit_requests = config.filters.rate_limit_requests,
        rate_limit_interval = ?config.filters.rate_limit_interval,
        max_attempts = config.store.max_attempts,
        on_exhausted = ?config.store.on_exhausted,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => observability::metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = MemoryStore::new();
    let ttl = config.filters.rate_limit_interval;
    let sweeper = tokio::spawn(store.clone().run_expiry(
        ttl,
        sweep_interval(ttl),
        shutdown.subscribe(),
    ));

    let bind_address = config.listener.bind_address.clone();
    let served = serve(config, store, &bind_address, shutdown).await;

    // the server may also stop on Ctrl+C, which the sweeper does not watch
    shutdown.trigger();
    if let Err(e) = sweeper.await {
        tracing::error!(error = %e, "Store expiry task failed");
    }
    served
}

async fn serve(
    config: GuardConfig,
    store: MemoryStore,
    bind_address: &str,
    shutdown: &Shutdown,
) -> Result<(), StartupError> {
    let server = GuardServer::new(config, Arc::new(store))?;

    let listener = TcpListener::bind(bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    server.run(listener, shutdown.subscribe()).await?;
    Ok(())
}

/// How often idle store entries are swept: once per window, between 1s and 60s.
fn sweep_interval(window: Duration) -> Duration {
    window.clamp(Duration::from_secs(1), Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_interval_follows_the_window_within_bounds() {
        assert_eq!(sweep_interval(Duration::from_millis(1)), Duration::from_secs(1));
        assert_eq!(sweep_interval(Duration::from_secs(30)), Duration::from_secs(30));
        assert_eq!(sweep_interval(Duration::from_secs(3600)), Duration::from_secs(60));
    }
}
