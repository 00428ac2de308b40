//! Bulk availability oracle.
//!
//! Classifies many seats from one consistent read of the durable tier. The
//! result is a point-in-time view for UI refresh and reconciliation; it
//! reserves nothing, so callers still have to acquire and handle `false`.

use chrono::{DateTime, Utc};
use seatlock_core::{HolderId, SeatId, SeatSnapshot, SeatStatus};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A seat held by an unexpired lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockedSeat {
    /// Locked seat
    pub seat_id: SeatId,
    /// Holder of the lock
    #[serde(rename = "userId")]
    pub holder_id: HolderId,
    /// When the lock lapses
    pub expires_at: DateTime<Utc>,
}

/// Outcome of a bulk availability check.
///
/// A locked seat appears in both `unavailable_seats` and `locked_seats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityReport {
    /// Seats a new holder could lock right now
    pub available_seats: Vec<SeatId>,
    /// Seats that cannot be locked (held, reserved, booked, blocked or unknown)
    pub unavailable_seats: Vec<SeatId>,
    /// Detail for seats held by an unexpired lock
    pub locked_seats: Vec<LockedSeat>,
}

/// Classifies seats as available, locked or unavailable.
pub struct AvailabilityOracle;

impl AvailabilityOracle {
    /// Classify `seat_ids` against `snapshots` read at `now`.
    ///
    /// Output follows input order with duplicates removed. Ids with no
    /// snapshot are reported unavailable. A `locked` seat whose lock has
    /// lapsed is available: it is reclaimable by the next acquire.
    #[must_use]
    pub fn classify(
        seat_ids: &[SeatId],
        snapshots: Vec<SeatSnapshot>,
        now: DateTime<Utc>,
    ) -> AvailabilityReport {
        let by_id: HashMap<SeatId, SeatSnapshot> = snapshots
            .into_iter()
            .map(|snapshot| (snapshot.seat.id, snapshot))
            .collect();

        let mut seen = HashSet::with_capacity(seat_ids.len());
        let mut report = AvailabilityReport::default();

        for seat_id in seat_ids.iter().filter(|id| seen.insert(**id)) {
            let Some(snapshot) = by_id.get(seat_id) else {
                report.unavailable_seats.push(*seat_id);
                continue;
            };

            if let Some(lock) = snapshot.active_lock(now) {
                report.unavailable_seats.push(*seat_id);
                report.locked_seats.push(LockedSeat {
                    seat_id: *seat_id,
                    holder_id: lock.holder_id.clone(),
                    expires_at: lock.expires_at,
                });
                continue;
            }

            match snapshot.seat.status {
                SeatStatus::Available | SeatStatus::Locked => report.available_seats.push(*seat_id),
                SeatStatus::Reserved | SeatStatus::Booked | SeatStatus::Blocked => {
                    report.unavailable_seats.push(*seat_id);
                }
            }
        }

        report
    }
}
