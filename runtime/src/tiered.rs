//! Dual-tier lock store.
//!
//! Pairs the durable [`LockStore`] (system of record) with a [`LockCache`]:
//!
//! - **Writes** go to the durable tier first and then only invalidate the
//!   seat's cache entry. A failed write leaves the cache untouched, and a
//!   slow write can never put back a record a later write removed.
//! - **Reads** prefer the cache and fall through to the durable tier on a
//!   miss, repopulating the cache unless a write invalidated it meanwhile.
//! - The cache never rejects anything. Every conditional decision is made by
//!   the durable tier.

use crate::cache::LockCache;
use crate::metrics::LockMetrics;
use chrono::{DateTime, Utc};
use seatlock_core::store::{AcquireOutcome, LockStore, ReleaseOutcome};
use seatlock_core::{EventId, HolderId, LockRecord, SeatId, SeatSnapshot, StoreError};
use tracing::error;

/// What a read found for a seat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// An unexpired lock
    Active(LockRecord),
    /// A lock whose TTL has elapsed but which has not been reclaimed yet
    Expired(LockRecord),
    /// No lock (or no such seat)
    Absent,
}

/// Durable tier plus its volatile cache.
pub struct TieredLockStore<S> {
    durable: S,
    cache: LockCache,
}

impl<S: LockStore> TieredLockStore<S> {
    /// Wrap a durable store with a fresh, empty cache.
    #[must_use]
    pub fn new(durable: S) -> Self {
        Self {
            durable,
            cache: LockCache::new(),
        }
    }

    /// The durable tier.
    pub const fn durable(&self) -> &S {
        &self.durable
    }

    /// The volatile tier.
    pub const fn cache(&self) -> &LockCache {
        &self.cache
    }

    /// Current lock for a seat, cache first.
    ///
    /// # Errors
    ///
    /// Returns error if the cache misses and the durable read fails.
    pub async fn lookup(&self, seat_id: &SeatId, now: DateTime<Utc>) -> Result<Lookup, StoreError> {
        if let Some(record) = self.cache.get(seat_id) {
            LockMetrics::record_cache_lookup(true);
            return Ok(classify(record, now));
        }
        LockMetrics::record_cache_lookup(false);

        let snapshot = self.read_through(seat_id, now).await?;
        Ok(snapshot
            .and_then(|snapshot| snapshot.lock)
            .map_or(Lookup::Absent, |record| classify(record, now)))
    }

    /// Event that owns a seat, or `None` if the seat does not exist.
    ///
    /// # Errors
    ///
    /// Returns error if the cache misses and the durable read fails.
    pub async fn event_of(
        &self,
        seat_id: &SeatId,
        now: DateTime<Utc>,
    ) -> Result<Option<EventId>, StoreError> {
        if let Some(record) = self.cache.get(seat_id) {
            return Ok(Some(record.event_id));
        }
        let snapshot = self.read_through(seat_id, now).await?;
        Ok(snapshot.map(|snapshot| snapshot.seat.event_id))
    }

    /// Conditionally acquire or refresh a lock, then invalidate the seat's
    /// cache entry.
    ///
    /// # Errors
    ///
    /// Returns error if the durable write fails; the cache is left untouched.
    pub async fn acquire(
        &self,
        claim: &LockRecord,
        now: DateTime<Utc>,
    ) -> Result<AcquireOutcome, StoreError> {
        let outcome = self
            .durable
            .try_acquire(claim, now)
            .await
            .inspect_err(|e| store_failed("acquire", e))?;

        self.cache.remove(&claim.seat_id);
        Ok(outcome)
    }

    /// Conditionally release a holder's lock, then invalidate the seat's
    /// cache entry.
    ///
    /// # Errors
    ///
    /// Returns error if the durable write fails; the cache is left untouched.
    pub async fn release(
        &self,
        seat_id: &SeatId,
        holder_id: &HolderId,
        now: DateTime<Utc>,
    ) -> Result<ReleaseOutcome, StoreError> {
        let outcome = self
            .durable
            .release(seat_id, holder_id, now)
            .await
            .inspect_err(|e| store_failed("release", e))?;

        self.cache.remove(seat_id);
        Ok(outcome)
    }

    /// Clear a seat's lock if it is still expired at the moment of the write.
    ///
    /// The cache entry is dropped only if it is expired too, so a refresh
    /// that landed in between survives in both tiers.
    ///
    /// # Errors
    ///
    /// Returns error if the durable write fails.
    pub async fn reclaim(
        &self,
        seat_id: &SeatId,
        now: DateTime<Utc>,
    ) -> Result<Option<LockRecord>, StoreError> {
        let cleared = self
            .durable
            .clear_expired(seat_id, now)
            .await
            .inspect_err(|e| store_failed("clear_expired", e))?;
        self.cache.remove_if_expired(seat_id, now);
        Ok(cleared)
    }

    /// Expired entries in the cache.
    #[must_use]
    pub fn cached_expired(&self, now: DateTime<Utc>) -> Vec<LockRecord> {
        self.cache.expired(now)
    }

    /// Expired records in the durable tier.
    ///
    /// # Errors
    ///
    /// Returns error if the durable read fails.
    pub async fn durable_expired(&self, now: DateTime<Utc>) -> Result<Vec<LockRecord>, StoreError> {
        self.durable
            .expired_locks(now)
            .await
            .inspect_err(|e| store_failed("expired_locks", e))
    }

    /// Consistent read of many seats from the durable tier.
    ///
    /// # Errors
    ///
    /// Returns error if the durable read fails.
    pub async fn load_seats(&self, seat_ids: &[SeatId]) -> Result<Vec<SeatSnapshot>, StoreError> {
        self.durable
            .load_seats(seat_ids)
            .await
            .inspect_err(|e| store_failed("load_seats", e))
    }

    /// Rebuild the cache from the durable tier's active locks.
    ///
    /// # Errors
    ///
    /// Returns error if the durable read fails; the cache is left as it was.
    pub async fn warm(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let active = self
            .durable
            .active_locks(now)
            .await
            .inspect_err(|e| store_failed("active_locks", e))?;
        let count = active.len();
        self.cache.replace_all(active);
        Ok(count)
    }

    async fn read_through(
        &self,
        seat_id: &SeatId,
        now: DateTime<Utc>,
    ) -> Result<Option<SeatSnapshot>, StoreError> {
        let seen = self.cache.generation();
        let snapshot = self
            .durable
            .load_seat(seat_id)
            .await
            .inspect_err(|e| store_failed("load_seat", e))?;
        if let Some(lock) = snapshot.as_ref().and_then(|s| s.active_lock(now)) {
            self.cache.fill(lock.clone(), seen);
        }
        Ok(snapshot)
    }
}

fn classify(record: LockRecord, now: DateTime<Utc>) -> Lookup {
    if record.is_expired(now) {
        Lookup::Expired(record)
    } else {
        Lookup::Active(record)
    }
}

fn store_failed(operation: &'static str, e: &StoreError) {
    error!(operation, error = %e, "Durable lock store failed");
    LockMetrics::record_store_error(operation);
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use chrono::Duration;
    use seatlock_core::{EventId, SeatStatus};
    use seatlock_testing::{InMemoryLockStore, fixtures, test_time};

    fn setup() -> (TieredLockStore<InMemoryLockStore>, InMemoryLockStore, SeatId) {
        let durable = InMemoryLockStore::new();
        let seat = fixtures::seat(&durable, EventId::new());
        (TieredLockStore::new(durable.clone()), durable, seat)
    }

    fn claim(durable: &InMemoryLockStore, seat: SeatId, holder: &str, ttl: i64) -> LockRecord {
        let event_id = durable.snapshot(&seat).unwrap().seat.event_id;
        LockRecord::claim(seat, event_id, HolderId::new(holder), test_time(), Duration::seconds(ttl))
            .unwrap()
    }

    #[tokio::test]
    async fn failed_durable_write_leaves_cache_empty() {
        let (store, durable, seat) = setup();
        durable.fail_writes(true);

        let result = store.acquire(&claim(&durable, seat, "a", 300), test_time()).await;

        assert!(result.is_err());
        assert!(store.cache().get(&seat).is_none());
    }

    #[tokio::test]
    async fn stale_cache_entry_does_not_block_acquire() {
        let (store, durable, seat) = setup();
        // Cache claims "a" holds the seat; the durable tier says it is free.
        store.cache().insert(claim(&durable, seat, "a", 300));

        let outcome = store.acquire(&claim(&durable, seat, "b", 300), test_time()).await.unwrap();

        assert!(matches!(outcome, AcquireOutcome::Acquired(_)));
        assert!(store.cache().get(&seat).is_none());
        let found = store.lookup(&seat, test_time()).await.unwrap();
        assert!(matches!(found, Lookup::Active(ref r) if r.holder_id == HolderId::new("b")));
        assert_eq!(store.cache().get(&seat).unwrap().holder_id, HolderId::new("b"));
    }

    #[tokio::test]
    async fn miss_reads_through_and_repopulates() {
        let (store, durable, seat) = setup();
        durable
            .try_acquire(&claim(&durable, seat, "a", 300), test_time())
            .await
            .unwrap();
        assert!(store.cache().is_empty());

        let found = store.lookup(&seat, test_time()).await.unwrap();

        assert!(matches!(found, Lookup::Active(ref r) if r.holder_id == HolderId::new("a")));
        assert!(store.cache().get(&seat).is_some());
    }

    #[tokio::test]
    async fn not_lockable_evicts_cached_entry() {
        let (store, durable, seat) = setup();
        store.acquire(&claim(&durable, seat, "a", 300), test_time()).await.unwrap();
        store.lookup(&seat, test_time()).await.unwrap();
        assert!(store.cache().get(&seat).is_some());
        durable.set_status(&seat, SeatStatus::Booked);

        let outcome = store.acquire(&claim(&durable, seat, "a", 300), test_time()).await.unwrap();

        assert_eq!(outcome, AcquireOutcome::NotLockable(SeatStatus::Booked));
        assert!(store.cache().get(&seat).is_none());
    }
}
