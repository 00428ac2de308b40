//! Health and metrics endpoints.

use crate::error::AppError;
use crate::state::AppState;
use crate::WebResult;
use axum::{extract::State, http::StatusCode};
use seatlock_core::store::LockStore;

/// Simple health check endpoint (for basic liveness).
///
/// Does not touch the durable tier.
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)] // Axum handler signature requires async
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Prometheus exposition of the process metrics.
///
/// ```text
/// GET /metrics
/// ```
///
/// # Errors
///
/// 503 if this process did not install the Prometheus recorder.
#[allow(clippy::unused_async)] // Axum handler signature requires async
pub async fn metrics<S: LockStore + 'static>(State(state): State<AppState<S>>) -> WebResult<String> {
    state
        .metrics
        .as_ref()
        .and_then(|metrics| metrics.render())
        .ok_or_else(|| AppError::unavailable("Metrics recorder is not installed"))
}
