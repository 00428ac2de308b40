//! Durable lock store abstraction.
//!
//! The [`LockStore`] trait is the system of record for seat status and lock
//! records. It survives process restarts and is shared by every instance of
//! the service, so it is where mutual exclusion is actually decided.
//!
//! # Conditional Writes
//!
//! Every mutating operation is a per-seat compare-and-set evaluated inside the
//! store at the moment of the write:
//!
//! | Operation | Applies when |
//! |---|---|
//! | [`try_acquire`](LockStore::try_acquire) | seat is `available`, or `locked` by the same holder, or `locked` with `expires_at <= now` |
//! | [`release`](LockStore::release) | seat is `locked` by the caller |
//! | [`clear_expired`](LockStore::clear_expired) | seat is still `locked` with `expires_at <= now` |
//!
//! Time is always supplied by the caller so a single [`Clock`](crate::environment::Clock)
//! governs expiry across both tiers.
//!
//! # Implementations
//!
//! - `PostgresLockStore` (seatlock-postgres) - production
//! - `InMemoryLockStore` (seatlock-testing) - tests, with failure injection

use crate::error::StoreError;
use crate::types::{HolderId, LockRecord, SeatId, SeatSnapshot, SeatStatus};
use chrono::{DateTime, Utc};
use std::future::Future;

/// Result of a conditional acquire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// A new lock was created (seat was available or its lock had lapsed)
    Acquired(LockRecord),
    /// The holder already owned the lock; its expiry was extended
    Refreshed(LockRecord),
    /// Another holder owns an unexpired lock
    HeldByOther(LockRecord),
    /// The seat is reserved, booked or blocked
    NotLockable(SeatStatus),
    /// No such seat
    SeatNotFound,
}

/// Result of a conditional release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The caller's lock was removed and the seat is available again
    Released(LockRecord),
    /// There was no active lock to release
    NotHeld,
    /// Another holder owns an unexpired lock
    HeldByOther(LockRecord),
    /// No such seat
    SeatNotFound,
}

/// Durable tier of the lock store.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the lock manager and the expiry
/// sweeper call into the same store concurrently.
pub trait LockStore: Send + Sync {
    /// Load one seat with its lock record.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read.
    fn load_seat(
        &self,
        seat_id: &SeatId,
    ) -> impl Future<Output = Result<Option<SeatSnapshot>, StoreError>> + Send;

    /// Load many seats in a single consistent read.
    ///
    /// Unknown ids are simply absent from the result.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read.
    fn load_seats(
        &self,
        seat_ids: &[SeatId],
    ) -> impl Future<Output = Result<Vec<SeatSnapshot>, StoreError>> + Send;

    /// Conditionally create or refresh a lock.
    ///
    /// `claim` carries the seat, holder and the requested `acquired_at` /
    /// `expires_at`. On refresh the original `acquired_at` is kept and the
    /// expiry never moves backwards.
    ///
    /// # Errors
    ///
    /// Returns error if the write fails; prior state is left unchanged.
    fn try_acquire(
        &self,
        claim: &LockRecord,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<AcquireOutcome, StoreError>> + Send;

    /// Conditionally remove the holder's lock and mark the seat available.
    ///
    /// # Errors
    ///
    /// Returns error if the write fails; prior state is left unchanged.
    fn release(
        &self,
        seat_id: &SeatId,
        holder_id: &HolderId,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<ReleaseOutcome, StoreError>> + Send;

    /// Remove the seat's lock only if it is still expired at the moment of the write.
    ///
    /// Returns the cleared record, or `None` if there was nothing expired to clear
    /// (the lock was refreshed, released or never existed).
    ///
    /// # Errors
    ///
    /// Returns error if the write fails.
    fn clear_expired(
        &self,
        seat_id: &SeatId,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<LockRecord>, StoreError>> + Send;

    /// All lock records with `expires_at <= now`.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read.
    fn expired_locks(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<LockRecord>, StoreError>> + Send;

    /// All lock records with `expires_at > now`.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read.
    fn active_locks(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<LockRecord>, StoreError>> + Send;
}

/// Per-row transitions shared by every [`LockStore`] implementation.
///
/// A store loads the row under its own exclusive guard (a mutex, a
/// `SELECT ... FOR UPDATE`), applies one of these, and persists the row if
/// it changed.
impl SeatSnapshot {
    /// Apply a conditional acquire in place.
    ///
    /// The returned record takes its seat and event from the row, not from
    /// the claim.
    pub fn apply_acquire(&mut self, claim: &LockRecord, now: DateTime<Utc>) -> AcquireOutcome {
        match self.seat.status {
            SeatStatus::Available => {}
            SeatStatus::Locked => match self.lock.as_mut() {
                Some(lock) if !lock.is_expired(now) && lock.is_held_by(&claim.holder_id) => {
                    lock.expires_at = lock.expires_at.max(claim.expires_at);
                    return AcquireOutcome::Refreshed(lock.clone());
                }
                Some(lock) if !lock.is_expired(now) => {
                    return AcquireOutcome::HeldByOther(lock.clone());
                }
                _ => {}
            },
            status => return AcquireOutcome::NotLockable(status),
        }

        let record = LockRecord {
            seat_id: self.seat.id,
            event_id: self.seat.event_id,
            ..claim.clone()
        };
        self.seat.status = SeatStatus::Locked;
        self.lock = Some(record.clone());
        AcquireOutcome::Acquired(record)
    }

    /// Apply a conditional release in place.
    ///
    /// The owner may release its lock even after it expired.
    pub fn apply_release(&mut self, holder_id: &HolderId, now: DateTime<Utc>) -> ReleaseOutcome {
        match self.lock.as_ref() {
            Some(lock) if lock.is_held_by(holder_id) => {}
            Some(lock) if !lock.is_expired(now) => return ReleaseOutcome::HeldByOther(lock.clone()),
            _ => return ReleaseOutcome::NotHeld,
        }
        self.unlock()
            .map_or(ReleaseOutcome::NotHeld, ReleaseOutcome::Released)
    }

    /// Clear the lock in place if it is expired at `now`.
    pub fn apply_clear_expired(&mut self, now: DateTime<Utc>) -> Option<LockRecord> {
        let expired = self.seat.status == SeatStatus::Locked
            && self.lock.as_ref().is_some_and(|lock| lock.is_expired(now));
        if expired { self.unlock() } else { None }
    }

    fn unlock(&mut self) -> Option<LockRecord> {
        self.seat.status = SeatStatus::Available;
        self.lock.take()
    }
}

impl AcquireOutcome {
    /// Whether the row was modified and must be persisted.
    #[must_use]
    pub const fn is_write(&self) -> bool {
        matches!(self, Self::Acquired(_) | Self::Refreshed(_))
    }
}

impl ReleaseOutcome {
    /// Whether the row was modified and must be persisted.
    #[must_use]
    pub const fn is_write(&self) -> bool {
        matches!(self, Self::Released(_))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::types::{EventId, Money, Seat};
    use chrono::{Duration, SubsecRound};

    fn row() -> SeatSnapshot {
        SeatSnapshot {
            seat: Seat::available(EventId::new(), "Stalls", Money::from_cents(4_000)),
            lock: None,
        }
    }

    fn claim(row: &SeatSnapshot, holder: &str, now: DateTime<Utc>, ttl: i64) -> LockRecord {
        LockRecord::claim(
            row.seat.id,
            row.seat.event_id,
            HolderId::new(holder),
            now,
            Duration::seconds(ttl),
        )
        .unwrap()
    }

    #[test]
    fn refresh_keeps_acquired_at_and_never_shortens() {
        let mut row = row();
        let t0 = Utc::now().trunc_subsecs(6);
        row.apply_acquire(&claim(&row, "a", t0, 300), t0);

        let t1 = t0 + Duration::seconds(10);
        let outcome = row.apply_acquire(&claim(&row, "a", t1, 5), t1);

        let AcquireOutcome::Refreshed(lock) = outcome else {
            unreachable!("same holder refreshes");
        };
        assert_eq!(lock.acquired_at, t0);
        assert_eq!(lock.expires_at, t0 + Duration::seconds(300));
    }

    #[test]
    fn expired_lock_of_other_holder_is_replaced() {
        let mut row = row();
        let t0 = Utc::now();
        row.apply_acquire(&claim(&row, "a", t0, 5), t0);

        let t1 = t0 + Duration::seconds(5);
        let outcome = row.apply_acquire(&claim(&row, "b", t1, 60), t1);

        assert!(matches!(outcome, AcquireOutcome::Acquired(ref r) if r.holder_id.as_str() == "b"));
    }

    #[test]
    fn terminal_statuses_are_not_lockable() {
        for status in [SeatStatus::Reserved, SeatStatus::Booked, SeatStatus::Blocked] {
            let mut row = row();
            row.seat.status = status;
            let now = Utc::now();
            let outcome = row.apply_acquire(&claim(&row, "a", now, 60), now);
            assert_eq!(outcome, AcquireOutcome::NotLockable(status));
            assert_eq!(row.seat.status, status);
        }
    }

    #[test]
    fn owner_can_release_after_expiry_but_others_cannot_before() {
        let mut row = row();
        let t0 = Utc::now();
        row.apply_acquire(&claim(&row, "a", t0, 5), t0);

        assert!(matches!(
            row.apply_release(&HolderId::new("b"), t0),
            ReleaseOutcome::HeldByOther(_)
        ));

        let later = t0 + Duration::seconds(30);
        assert!(matches!(
            row.apply_release(&HolderId::new("a"), later),
            ReleaseOutcome::Released(_)
        ));
        assert_eq!(row.seat.status, SeatStatus::Available);
        assert_eq!(row.apply_release(&HolderId::new("a"), later), ReleaseOutcome::NotHeld);
    }

    #[test]
    fn clear_expired_rechecks_expiry() {
        let mut row = row();
        let t0 = Utc::now();
        row.apply_acquire(&claim(&row, "a", t0, 5), t0);

        assert_eq!(row.apply_clear_expired(t0 + Duration::seconds(4)), None);
        assert!(row.apply_clear_expired(t0 + Duration::seconds(5)).is_some());
        assert!(row.lock.is_none());
    }
}
