pub mod handlers;
pub mod routes;

use tokio::sync::broadcast;
use tracing::info;

use crate::error::{Result, ZetaError};
pub use routes::AppState;

/// Serve the HTTP API on `bind` until `shutdown` fires.
pub async fn serve(bind: &str, state: AppState, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
    let app = routes::build(state);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| ZetaError::Config(format!("failed to bind {bind}: {e}")))?;

    info!(bind = %bind, "HTTP API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
        .map_err(|e| ZetaError::Config(format!("server error: {e}")))?;

    info!("HTTP API stopped");
    Ok(())
}
