//! Booking status relay.
//!
//! The booking workflow owns bookings; it posts status changes here so they
//! reach the event's subscribers through the same channel as seat changes.

use crate::error::AppError;
use crate::state::AppState;
use crate::WebResult;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use seatlock_core::store::LockStore;
use seatlock_core::{BookingId, EventId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Booking status change to relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingStatusRequest {
    /// Booking that changed
    pub booking_id: BookingId,
    /// New status as named by the booking workflow
    pub status: String,
}

/// Relay outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingStatusResponse {
    /// Subscribers the message was handed to
    pub delivered: usize,
}

/// Publish a booking status change on an event channel.
///
/// ```text
/// POST /api/events/:event_id/bookings/status   {"bookingId": "...", "status": "confirmed"}
/// ```
///
/// # Errors
///
/// 422 if `status` is blank.
pub async fn publish_booking_status<S: LockStore + 'static>(
    State(state): State<AppState<S>>,
    Path(event_id): Path<Uuid>,
    Json(request): Json<BookingStatusRequest>,
) -> WebResult<(StatusCode, Json<BookingStatusResponse>)> {
    if request.status.trim().is_empty() {
        return Err(AppError::validation("status must not be empty"));
    }

    let delivered = state
        .manager
        .hub()
        .publish_booking_status(
            EventId::from_uuid(event_id),
            request.booking_id,
            request.status,
            state.manager.now(),
        )
        .await;

    Ok((StatusCode::ACCEPTED, Json(BookingStatusResponse { delivered })))
}
