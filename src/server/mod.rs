//! HTTP control API: routes, DTOs and error mapping
//!
//! A thin layer over [`JobManager`](crate::crawler::JobManager) and the
//! content store.

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use routes::router;
pub use state::AppState;

use std::sync::Arc;

use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Serves the control API on `bind` until Ctrl+C, then stops running jobs
pub async fn serve(bind: &str, state: Arc<AppState>) -> std::io::Result<()> {
    let app = router(Arc::clone(&state)).layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(bind).await?;
    tracing::info!("Control API listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let stopped = state.manager.stop_all();
    if stopped > 0 {
        tracing::info!("Stopped {} running jobs on shutdown", stopped);
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
