//! Health check endpoints.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Basic health check (is the server running?)
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
pub struct ReadyResponse {
    status: &'static str,
    rate_limiter: &'static str,
    rate_limiter_ok: bool,
    verification_configured: bool,
    sheets_configured: bool,
}

/// Readiness check (are secrets present and the rate-limit store reachable?)
pub async fn ready_check(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let rate_limiter_ok = state.rate_limiter.ping().await;
    let verification_configured = state.verifier.is_configured();
    let sheets_configured = state.sink.is_configured();

    let ready = rate_limiter_ok && verification_configured && sheets_configured;
    let status = if ready {
        StatusCode::OK
    } else {
        // Return 503 if not ready
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadyResponse {
            status: if ready { "ready" } else { "not_ready" },
            rate_limiter: state.rate_limiter.backend_name(),
            rate_limiter_ok,
            verification_configured,
            sheets_configured,
        }),
    )
}
