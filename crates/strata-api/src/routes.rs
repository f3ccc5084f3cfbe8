//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with tracing, compression, a request body
//! limit, and all endpoint handlers.

use std::future::Future;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use strata_core::error::StrataError;

use crate::handlers;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;

    Router::new()
        .route("/search", post(handlers::search))
        .route("/search-by-vector", post(handlers::search_by_vector))
        .route("/info", get(handlers::info))
        .route("/health", get(handlers::health))
        .route("/reload", post(handlers::reload))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the router on `host:port` until `shutdown` resolves.
pub async fn start_server(
    host: &str,
    port: u16,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), StrataError> {
    let addr = format!("{}:{}", host, port);
    let router = create_router(state);

    tracing::info!("Starting search service on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| StrataError::Api(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| StrataError::Api(format!("Server error: {}", e)))?;

    tracing::info!("Search service stopped");
    Ok(())
}
