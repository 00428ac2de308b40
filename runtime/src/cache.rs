//! Volatile tier of the lock store.
//!
//! A process-local map from seat to lock record. It is a disposable
//! accelerator: it can be cleared and rebuilt from the durable tier at any
//! time, and it is never trusted to reject an operation on its own.
//!
//! Every invalidation bumps a generation counter. A reader that loaded a row
//! from the durable tier only caches it if no invalidation happened since it
//! started, so a read that raced a write cannot put back what the write
//! removed.

use chrono::{DateTime, Utc};
use seatlock_core::{LockRecord, SeatId};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Cache content plus its invalidation counter.
#[derive(Debug, Default)]
struct Entries {
    records: HashMap<SeatId, LockRecord>,
    generation: u64,
}

impl Entries {
    const fn invalidate(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }
}

/// Token taken before a durable read, checked by [`LockCache::fill`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

/// In-process lock cache.
///
/// Owned by a [`TieredLockStore`](crate::tiered::TieredLockStore); create one
/// per store so nothing leaks between instances or tests.
#[derive(Debug, Default)]
pub struct LockCache {
    entries: RwLock<Entries>,
}

impl LockCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached record for a seat, expired or not.
    #[must_use]
    pub fn get(&self, seat_id: &SeatId) -> Option<LockRecord> {
        self.read().records.get(seat_id).cloned()
    }

    /// Current invalidation generation.
    #[must_use]
    pub fn generation(&self) -> Generation {
        Generation(self.read().generation)
    }

    /// Store or replace the record for its seat.
    pub fn insert(&self, record: LockRecord) {
        self.write().records.insert(record.seat_id, record);
        self.report_size();
    }

    /// Store a record read from the durable tier, unless the cache was
    /// invalidated after `seen` was taken.
    pub fn fill(&self, record: LockRecord, seen: Generation) -> bool {
        let mut entries = self.write();
        let current = entries.generation == seen.0;
        if current {
            entries.records.insert(record.seat_id, record);
        }
        drop(entries);
        self.report_size();
        current
    }

    /// Drop whatever is cached for a seat.
    pub fn remove(&self, seat_id: &SeatId) -> Option<LockRecord> {
        let mut entries = self.write();
        entries.invalidate();
        let removed = entries.records.remove(seat_id);
        drop(entries);
        self.report_size();
        removed
    }

    /// Drop the seat's entry only if it is expired at `now`.
    ///
    /// A record refreshed after the caller decided to evict is kept.
    pub fn remove_if_expired(&self, seat_id: &SeatId, now: DateTime<Utc>) -> bool {
        let mut entries = self.write();
        entries.invalidate();
        let expired = entries
            .records
            .get(seat_id)
            .is_some_and(|record| record.is_expired(now));
        if expired {
            entries.records.remove(seat_id);
        }
        drop(entries);
        self.report_size();
        expired
    }

    /// Snapshot of all entries expired at `now`.
    #[must_use]
    pub fn expired(&self, now: DateTime<Utc>) -> Vec<LockRecord> {
        self.read()
            .records
            .values()
            .filter(|record| record.is_expired(now))
            .cloned()
            .collect()
    }

    /// Replace the whole cache content.
    pub fn replace_all(&self, records: impl IntoIterator<Item = LockRecord>) {
        let mut entries = self.write();
        entries.invalidate();
        entries.records.clear();
        entries
            .records
            .extend(records.into_iter().map(|record| (record.seat_id, record)));
        drop(entries);
        self.report_size();
    }

    /// Forget everything.
    pub fn clear(&self) {
        let mut entries = self.write();
        entries.invalidate();
        entries.records.clear();
        drop(entries);
        self.report_size();
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().records.is_empty()
    }

    // The cache holds no invariant worth failing over: a poisoned lock still
    // guards a usable map.
    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    #[allow(clippy::cast_precision_loss)]
    fn report_size(&self) {
        metrics::gauge!("seatlock_cached_locks").set(self.len() as f64);
    }
}
