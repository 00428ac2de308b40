//! Domain types for seat locking.
//!
//! Identifiers, the seat entity, its status, and the lock record that
//! represents a temporary claim on a seat.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::StoreError;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an event (the owner of a set of seats)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random `EventId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `EventId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a seat
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeatId(Uuid);

impl SeatId {
    /// Creates a new random `SeatId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `SeatId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SeatId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a booking (owned by the external booking workflow)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookingId(Uuid);

impl BookingId {
    /// Creates a new random `BookingId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `BookingId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BookingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier of the actor claiming a seat (user, session, cart...).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HolderId(String);

impl HolderId {
    /// Creates a new `HolderId`
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the holder id as a string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Money
// ============================================================================

/// Represents money in cents to avoid floating-point arithmetic errors
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Money(u64);

impl Money {
    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Seat
// ============================================================================

/// Lifecycle status of a seat.
///
/// `Locked` is the only status this subsystem creates or removes. `Reserved`,
/// `Booked` and `Blocked` are written by the booking and admin workflows and
/// are terminal as far as locking is concerned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatStatus {
    /// Free to be locked
    Available,
    /// Temporarily held by a lock record
    Locked,
    /// Pending payment in the booking workflow
    Reserved,
    /// Sold
    Booked,
    /// Administratively withdrawn from sale
    Blocked,
}

impl SeatStatus {
    /// Convert status to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Locked => "locked",
            Self::Reserved => "reserved",
            Self::Booked => "booked",
            Self::Blocked => "blocked",
        }
    }

    /// Parse status from database string.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if the string doesn't match a known status.
    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "available" => Ok(Self::Available),
            "locked" => Ok(Self::Locked),
            "reserved" => Ok(Self::Reserved),
            "booked" => Ok(Self::Booked),
            "blocked" => Ok(Self::Blocked),
            _ => Err(StoreError::Corrupt(format!("Invalid seat status: {s}"))),
        }
    }
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sellable inventory unit.
///
/// Category and price belong to the catalog; this subsystem reads them but only
/// ever writes `status`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    /// Unique seat identifier
    pub id: SeatId,
    /// Event this seat is sold for
    pub event_id: EventId,
    /// Category or section label (e.g., "VIP", "Balcony")
    pub category: String,
    /// Catalog price
    pub price: Money,
    /// Current status
    pub status: SeatStatus,
}

impl Seat {
    /// Creates an available seat.
    #[must_use]
    pub fn available(event_id: EventId, category: impl Into<String>, price: Money) -> Self {
        Self {
            id: SeatId::new(),
            event_id,
            category: category.into(),
            price,
            status: SeatStatus::Available,
        }
    }
}

// ============================================================================
// Lock Record
// ============================================================================

/// A temporary exclusive claim on a seat.
///
/// Invariant: `expires_at > acquired_at`. A record is active while
/// `now < expires_at`; from `expires_at` on it is reclaimable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Locked seat
    pub seat_id: SeatId,
    /// Event owning the seat (routes broadcasts to the right channel)
    pub event_id: EventId,
    /// Actor holding the claim
    pub holder_id: HolderId,
    /// When the claim was first granted
    pub acquired_at: DateTime<Utc>,
    /// When the claim lapses
    pub expires_at: DateTime<Utc>,
}

impl LockRecord {
    /// Creates a claim starting at `now` and lasting `ttl`.
    ///
    /// Both instants are truncated to microseconds, the precision the
    /// durable tier keeps, so a cached claim compares equal to its stored
    /// row. Returns `None` if the expiry is not representable or does not
    /// land strictly after the start.
    #[must_use]
    pub fn claim(
        seat_id: SeatId,
        event_id: EventId,
        holder_id: HolderId,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Option<Self> {
        let acquired_at = now.trunc_subsecs(6);
        let expires_at = acquired_at.checked_add_signed(ttl)?.trunc_subsecs(6);
        (expires_at > acquired_at).then_some(Self {
            seat_id,
            event_id,
            holder_id,
            acquired_at,
            expires_at,
        })
    }

    /// Checks if the lock has expired
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Checks if the lock is held by `holder_id`
    #[must_use]
    pub fn is_held_by(&self, holder_id: &HolderId) -> bool {
        &self.holder_id == holder_id
    }
}

/// A consistent read of one seat and its lock, if any.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeatSnapshot {
    /// The seat row
    pub seat: Seat,
    /// The lock record stored with it (present iff status is `Locked`)
    pub lock: Option<LockRecord>,
}

impl SeatSnapshot {
    /// The lock, if one exists and has not expired at `now`.
    #[must_use]
    pub fn active_lock(&self, now: DateTime<Utc>) -> Option<&LockRecord> {
        self.lock.as_ref().filter(|lock| !lock.is_expired(now))
    }

    /// Whether a new holder could lock this seat at `now`.
    ///
    /// True for available seats and for locked seats whose lock has lapsed.
    #[must_use]
    pub fn is_lockable(&self, now: DateTime<Utc>) -> bool {
        match self.seat.status {
            SeatStatus::Available => true,
            SeatStatus::Locked => self.active_lock(now).is_none(),
            SeatStatus::Reserved | SeatStatus::Booked | SeatStatus::Blocked => false,
        }
    }
}
