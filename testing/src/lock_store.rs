//! In-memory durable tier for tests.
//!
//! Mirrors the conditional-write semantics of the Postgres store and adds
//! switches to make reads or writes fail, so tests can check that a failed
//! durable write never leaves a lock visible in the cache.

use chrono::{DateTime, Utc};
use seatlock_core::store::{AcquireOutcome, LockStore, ReleaseOutcome};
use seatlock_core::{HolderId, LockRecord, Seat, SeatId, SeatSnapshot, SeatStatus, StoreError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// In-memory [`LockStore`].
///
/// Clones share the same rows, so a test can keep a handle to play the
/// booking workflow (e.g. [`set_status`](Self::set_status)) while the lock
/// manager owns another.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLockStore {
    rows: Arc<Mutex<HashMap<SeatId, SeatSnapshot>>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
}

impl InMemoryLockStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a seat to the catalog.
    pub fn insert_seat(&self, seat: Seat) {
        self.rows().insert(seat.id, SeatSnapshot { seat, lock: None });
    }

    /// Move a seat to `status` the way the booking or admin workflow would,
    /// dropping any lock stored with it.
    pub fn set_status(&self, seat_id: &SeatId, status: SeatStatus) {
        if let Some(row) = self.rows().get_mut(seat_id) {
            row.seat.status = status;
            row.lock = None;
        }
    }

    /// Current row for a seat, bypassing failure injection.
    #[must_use]
    pub fn snapshot(&self, seat_id: &SeatId) -> Option<SeatSnapshot> {
        self.rows().get(seat_id).cloned()
    }

    /// Number of seats that currently carry a lock record.
    #[must_use]
    pub fn lock_count(&self) -> usize {
        self.rows().values().filter(|row| row.lock.is_some()).count()
    }

    /// Number of successful mutating operations so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every read fail with [`StoreError::Connection`].
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every write fail with [`StoreError::Connection`].
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn rows(&self) -> MutexGuard<'_, HashMap<SeatId, SeatSnapshot>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_read(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("injected read failure".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("injected write failure".to_string()));
        }
        Ok(())
    }

    fn committed(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

impl LockStore for InMemoryLockStore {
    async fn load_seat(&self, seat_id: &SeatId) -> Result<Option<SeatSnapshot>, StoreError> {
        self.check_read()?;
        Ok(self.rows().get(seat_id).cloned())
    }

    async fn load_seats(&self, seat_ids: &[SeatId]) -> Result<Vec<SeatSnapshot>, StoreError> {
        self.check_read()?;
        let rows = self.rows();
        Ok(seat_ids.iter().filter_map(|id| rows.get(id).cloned()).collect())
    }

    async fn try_acquire(
        &self,
        claim: &LockRecord,
        now: DateTime<Utc>,
    ) -> Result<AcquireOutcome, StoreError> {
        self.check_write()?;
        let mut rows = self.rows();
        let Some(row) = rows.get_mut(&claim.seat_id) else {
            return Ok(AcquireOutcome::SeatNotFound);
        };
        let outcome = row.apply_acquire(claim, now);
        if outcome.is_write() {
            self.committed();
        }
        Ok(outcome)
    }

    async fn release(
        &self,
        seat_id: &SeatId,
        holder_id: &HolderId,
        now: DateTime<Utc>,
    ) -> Result<ReleaseOutcome, StoreError> {
        self.check_write()?;
        let mut rows = self.rows();
        let Some(row) = rows.get_mut(seat_id) else {
            return Ok(ReleaseOutcome::SeatNotFound);
        };
        let outcome = row.apply_release(holder_id, now);
        if outcome.is_write() {
            self.committed();
        }
        Ok(outcome)
    }

    async fn clear_expired(
        &self,
        seat_id: &SeatId,
        now: DateTime<Utc>,
    ) -> Result<Option<LockRecord>, StoreError> {
        self.check_write()?;
        let cleared = self
            .rows()
            .get_mut(seat_id)
            .and_then(|row| row.apply_clear_expired(now));
        if cleared.is_some() {
            self.committed();
        }
        Ok(cleared)
    }

    async fn expired_locks(&self, now: DateTime<Utc>) -> Result<Vec<LockRecord>, StoreError> {
        self.check_read()?;
        Ok(self
            .rows()
            .values()
            .filter_map(|row| row.lock.clone())
            .filter(|lock| lock.is_expired(now))
            .collect())
    }

    async fn active_locks(&self, now: DateTime<Utc>) -> Result<Vec<LockRecord>, StoreError> {
        self.check_read()?;
        Ok(self
            .rows()
            .values()
            .filter_map(|row| row.lock.clone())
            .filter(|lock| !lock.is_expired(now))
            .collect())
    }
}
