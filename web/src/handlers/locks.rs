//! Seat lock endpoints.
//!
//! ```text
//! POST   /api/seats/:seat_id/lock   {"holderId": "...", "ttlSeconds": 300}
//! DELETE /api/seats/:seat_id/lock   {"holderId": "..."}
//! GET    /api/seats/:seat_id/lock
//! ```
//!
//! A conflict is `200 {"acquired": false}`, not an error status: the seat is
//! simply unavailable.

use crate::error::AppError;
use crate::state::AppState;
use crate::WebResult;
use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use seatlock_core::store::LockStore;
use seatlock_core::{HolderId, LockRecord, SeatId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of an acquire request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcquireRequest {
    /// Caller taking the lock
    pub holder_id: HolderId,
    /// Lock lifetime; the configured default when omitted
    #[serde(default)]
    pub ttl_seconds: Option<i64>,
}

/// Result of an acquire request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcquireResponse {
    /// Whether the caller now holds the seat
    pub acquired: bool,
}

/// Body of a release request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseRequest {
    /// Caller giving up the lock
    pub holder_id: HolderId,
}

/// Result of a release request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseResponse {
    /// Always `true`; a foreign lock is answered with 403 instead
    pub released: bool,
}

/// Current holder of a seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockView {
    /// Holder of the unexpired lock
    pub holder_id: HolderId,
    /// When the lock lapses
    pub expires_at: DateTime<Utc>,
}

impl From<LockRecord> for LockView {
    fn from(record: LockRecord) -> Self {
        Self {
            holder_id: record.holder_id,
            expires_at: record.expires_at,
        }
    }
}

/// Acquire or refresh a seat lock.
///
/// # Errors
///
/// - 404 if the seat does not exist
/// - 422 if `ttlSeconds` is not positive or exceeds the configured maximum
/// - 503 if the durable tier is unavailable
pub async fn acquire_lock<S: LockStore + 'static>(
    State(state): State<AppState<S>>,
    Path(seat_id): Path<Uuid>,
    Json(request): Json<AcquireRequest>,
) -> WebResult<Json<AcquireResponse>> {
    let max_ttl = i64::try_from(state.locks.max_ttl).unwrap_or(i64::MAX);
    let ttl = match request.ttl_seconds {
        Some(seconds) if seconds > max_ttl => {
            return Err(AppError::validation(format!(
                "ttlSeconds must be at most {max_ttl}"
            )));
        }
        Some(seconds) => Duration::try_seconds(seconds)
            .ok_or_else(|| AppError::validation("ttlSeconds is out of range"))?,
        None => state.locks.default_ttl(),
    };

    let acquired = state
        .manager
        .acquire_lock_for(SeatId::from_uuid(seat_id), &request.holder_id, ttl)
        .await?;

    Ok(Json(AcquireResponse { acquired }))
}

/// Release a seat lock held by the caller.
///
/// Releasing a seat with no lock succeeds.
///
/// # Errors
///
/// - 403 if another holder has the seat
/// - 404 if the seat does not exist
/// - 503 if the durable tier is unavailable
pub async fn release_lock<S: LockStore + 'static>(
    State(state): State<AppState<S>>,
    Path(seat_id): Path<Uuid>,
    Json(request): Json<ReleaseRequest>,
) -> WebResult<Json<ReleaseResponse>> {
    let released = state
        .manager
        .release_lock(SeatId::from_uuid(seat_id), &request.holder_id)
        .await?;

    Ok(Json(ReleaseResponse { released }))
}

/// Current unexpired lock on a seat, or `null`.
///
/// # Errors
///
/// 503 if the seat is not cached and the durable tier is unavailable.
pub async fn check_lock<S: LockStore + 'static>(
    State(state): State<AppState<S>>,
    Path(seat_id): Path<Uuid>,
) -> WebResult<Json<Option<LockView>>> {
    let lock = state.manager.check_lock(SeatId::from_uuid(seat_id)).await?;
    Ok(Json(lock.map(LockView::from)))
}
