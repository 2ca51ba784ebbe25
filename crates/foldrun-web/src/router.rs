//! Axum router. Maps all URL paths to handlers.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{
    structures::api_structure,
    system::health,
    tools::{api_tool_invoke, api_tools},
};
use crate::sse::sse_handler;
use crate::state::{AppState, SharedState};

/// Build and return the full Axum router.
pub fn build_router(state: AppState) -> Router {
    let shared: SharedState = Arc::new(state);

    Router::new()
        .route("/health", get(health))
        // SSE streaming
        .route("/api/events", get(sse_handler))
        // API endpoints
        .route("/api/tools",        get(api_tools))
        .route("/api/tools/{name}", post(api_tool_invoke))
        .route("/api/structures/{file}", get(api_structure))
        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive()),
        )
        .with_state(shared)
}
