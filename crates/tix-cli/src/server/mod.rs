//! HTTP front end for the lifecycle engine (`tix serve`).

pub mod error;
pub mod handlers;
pub mod routes;

use std::sync::Arc;

use anyhow::Context as _;
use tix_core::{LifecycleService, Projector};
use tracing::info;

pub use routes::build_router;

/// Shared handler state. Cloned per request; everything behind it is `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<LifecycleService>,
    pub projector: Arc<Projector>,
    /// Backlog size when a request gives no `limit`.
    pub default_limit: usize,
}

impl AppState {
    pub fn new(service: LifecycleService, projector: Projector, default_limit: usize) -> Self {
        Self {
            service: Arc::new(service),
            projector: Arc::new(projector),
            default_limit,
        }
    }
}

/// Bind `addr` and serve until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %listener.local_addr()?, "tix server listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("tix server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(%err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
