//! HTTP route handlers for Formgate.

use axum::{
    Router,
    routing::{any, get},
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod health;
mod submit;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let submit_path = state.config.submit_path.clone();

    Router::new()
        // Health & Status
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))

        // Form submission; method gating happens in the handler
        .route(&submit_path, any(submit::submit))

        .layer(TraceLayer::new_for_http())

        // Add shared state
        .with_state(state)
}
