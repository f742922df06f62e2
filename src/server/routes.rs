use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};

use crate::feeds::Feeds;
use crate::orchestrator::Orchestrator;

use super::handlers;

/// State shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    /// Exchange, odds and pharmacy data for the direct feed routes.
    pub feeds: Arc<Feeds>,
}

pub fn build(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/chat", post(handlers::chat))
        .route("/api/health", get(handlers::health))
        // Feeds
        .route("/api/doviz", get(handlers::exchange))
        .route("/api/iddaa", get(handlers::odds))
        .route("/api/eczane/{city}", get(handlers::pharmacies))
        .layer(cors)
        .with_state(state)
}
