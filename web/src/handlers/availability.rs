//! Bulk availability endpoint.

use crate::error::AppError;
use crate::state::AppState;
use crate::WebResult;
use axum::{extract::State, Json};
use seatlock_core::store::LockStore;
use seatlock_core::SeatId;
use seatlock_runtime::AvailabilityReport;
use serde::{Deserialize, Serialize};

/// Largest number of seats a single request may ask about.
pub const MAX_SEATS_PER_REQUEST: usize = 5_000;

/// Body of a bulk availability request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRequest {
    /// Seats to classify
    pub seat_ids: Vec<SeatId>,
}

/// Classify many seats at once.
///
/// ```text
/// POST /api/seats/availability   {"seatIds": ["...", "..."]}
/// ```
///
/// # Errors
///
/// - 422 if more than [`MAX_SEATS_PER_REQUEST`] seats are requested
/// - 503 if the durable tier is unavailable
pub async fn bulk_check<S: LockStore + 'static>(
    State(state): State<AppState<S>>,
    Json(request): Json<AvailabilityRequest>,
) -> WebResult<Json<AvailabilityReport>> {
    if request.seat_ids.len() > MAX_SEATS_PER_REQUEST {
        return Err(AppError::validation(format!(
            "At most {MAX_SEATS_PER_REQUEST} seats per request"
        )));
    }

    let report = state
        .manager
        .bulk_check_availability(&request.seat_ids)
        .await?;
    Ok(Json(report))
}
