//! Messages pushed to observers of an event channel.
//!
//! Delivery is at-most-once: no acknowledgement, no replay, no queueing for
//! disconnected subscribers. Observers reconcile with a bulk availability check
//! whenever they (re)connect.
//!
//! # Wire Format
//!
//! ```json
//! {
//!   "type": "seat-status-change",
//!   "seatId": "550e8400-...",
//!   "status": "locked",
//!   "holderId": "user-42",
//!   "timestamp": "2025-01-01T00:00:00Z"
//! }
//! ```

use crate::types::{BookingId, HolderId, SeatId, SeatStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status change published on an event channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum StatusMessage {
    /// A seat changed status (locked, released, reclaimed)
    SeatStatusChange {
        /// Seat that changed
        seat_id: SeatId,
        /// New status
        status: SeatStatus,
        /// Holder of the new lock, when the seat became locked
        #[serde(default, skip_serializing_if = "Option::is_none")]
        holder_id: Option<HolderId>,
        /// When the change was committed
        timestamp: DateTime<Utc>,
    },
    /// A booking changed status (emitted by the booking workflow)
    BookingStatusChange {
        /// Booking that changed
        booking_id: BookingId,
        /// New booking status, as named by the booking workflow
        status: String,
        /// When the change happened
        timestamp: DateTime<Utc>,
    },
}

impl StatusMessage {
    /// Short name of the message kind, used for metrics labels.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SeatStatusChange { .. } => "seat-status-change",
            Self::BookingStatusChange { .. } => "booking-status-change",
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn seat_status_change_uses_camel_case_fields() {
        let message = StatusMessage::SeatStatusChange {
            seat_id: SeatId::new(),
            status: SeatStatus::Locked,
            holder_id: Some(HolderId::new("user-42")),
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "seat-status-change");
        assert_eq!(json["status"], "locked");
        assert_eq!(json["holderId"], "user-42");
        assert!(json.get("seatId").is_some());
    }

    #[test]
    fn released_seat_omits_holder() {
        let message = StatusMessage::SeatStatusChange {
            seat_id: SeatId::new(),
            status: SeatStatus::Available,
            holder_id: None,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(&message).unwrap();
        assert!(json.get("holderId").is_none());
        assert_eq!(message.kind(), "seat-status-change");
    }
}
