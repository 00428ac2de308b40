//! Lock manager: the public operation surface.
//!
//! ```text
//! caller ──> LockManager ──> TieredLockStore ──> durable tier (CAS)
//!                 │                 └──────────> cache (corrected after)
//!                 └──> BroadcastHub (after the state change is committed)
//! ```
//!
//! Operations run concurrently with no global serialization. Two acquires on
//! the same seat are resolved by the durable tier's per-seat compare-and-set;
//! operations on different seats never interact.

use crate::availability::{AvailabilityOracle, AvailabilityReport};
use crate::hub::{BroadcastHub, Subscription};
use crate::metrics::LockMetrics;
use crate::tiered::{Lookup, TieredLockStore};
use chrono::{DateTime, Duration, Utc};
use seatlock_core::environment::Clock;
use seatlock_core::error::Result;
use seatlock_core::store::{AcquireOutcome, LockStore, ReleaseOutcome};
use seatlock_core::{EventId, HolderId, LockError, LockRecord, SeatId, SeatStatus, StoreError};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Lock TTL in seconds used when the caller does not pass one.
pub const DEFAULT_TTL_SECS: i64 = 300;

/// Result of [`LockManager::acquire_seats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupHold {
    /// Every seat is now held by the caller
    Held(Vec<SeatId>),
    /// `seat_id` could not be locked; seats newly locked by this call were released again
    Conflict {
        /// First seat that could not be locked
        seat_id: SeatId,
        /// Seats this call had locked and then released
        released: Vec<SeatId>,
    },
}

/// Acquire, release and inspect seat locks.
///
/// Cheap to clone; clones share the store, hub and clock.
pub struct LockManager<S> {
    store: Arc<TieredLockStore<S>>,
    hub: Arc<BroadcastHub>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
}

impl<S> Clone for LockManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            hub: Arc::clone(&self.hub),
            clock: Arc::clone(&self.clock),
            default_ttl: self.default_ttl,
        }
    }
}

impl<S: LockStore> LockManager<S> {
    /// Create a manager over a durable store, with an empty cache.
    #[must_use]
    pub fn new(durable: S, hub: Arc<BroadcastHub>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Arc::new(TieredLockStore::new(durable)),
            hub,
            clock,
            default_ttl: Duration::seconds(DEFAULT_TTL_SECS),
        }
    }

    /// Override the TTL used by [`acquire_lock`](Self::acquire_lock).
    #[must_use]
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// The dual-tier store.
    #[must_use]
    pub fn store(&self) -> &TieredLockStore<S> {
        &self.store
    }

    /// The broadcast hub.
    #[must_use]
    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    /// Current time as seen by this manager.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// TTL applied by [`acquire_lock`](Self::acquire_lock).
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Acquire or refresh a lock with the default TTL.
    ///
    /// # Errors
    ///
    /// See [`acquire_lock_for`](Self::acquire_lock_for).
    pub async fn acquire_lock(&self, seat_id: SeatId, holder_id: &HolderId) -> Result<bool> {
        self.acquire_lock_for(seat_id, holder_id, self.default_ttl).await
    }

    /// Acquire or refresh a lock for `ttl`.
    ///
    /// Returns `true` if `holder_id` holds the seat afterwards, `false` if
    /// another holder has an unexpired lock or the seat is reserved, booked
    /// or blocked. Repeated calls by the same holder always succeed and never
    /// shorten the lock.
    ///
    /// # Errors
    ///
    /// - [`LockError::InvalidTtl`] if `ttl` is not positive or its expiry
    ///   cannot be represented
    /// - [`LockError::SeatNotFound`] if the seat does not exist
    /// - [`LockError::Store`] if the durable tier fails; nothing was changed
    pub async fn acquire_lock_for(
        &self,
        seat_id: SeatId,
        holder_id: &HolderId,
        ttl: Duration,
    ) -> Result<bool> {
        let outcome = self.acquire(seat_id, holder_id, ttl).await?;
        Ok(matches!(
            outcome,
            AcquireOutcome::Acquired(_) | AcquireOutcome::Refreshed(_)
        ))
    }

    /// Release the holder's lock.
    ///
    /// Releasing a seat with no active lock is a successful no-op.
    ///
    /// # Errors
    ///
    /// - [`LockError::Forbidden`] if another holder owns an unexpired lock
    /// - [`LockError::SeatNotFound`] if the seat does not exist
    /// - [`LockError::Store`] if the durable tier fails; nothing was changed
    pub async fn release_lock(&self, seat_id: SeatId, holder_id: &HolderId) -> Result<bool> {
        let now = self.clock.now();
        match self.store.release(&seat_id, holder_id, now).await? {
            ReleaseOutcome::Released(record) => {
                LockMetrics::record_release("released");
                info!(%seat_id, %holder_id, "Lock released");
                self.hub
                    .publish_seat_status(record.event_id, seat_id, SeatStatus::Available, None, now)
                    .await;
                Ok(true)
            }
            ReleaseOutcome::NotHeld => {
                LockMetrics::record_release("not_held");
                debug!(%seat_id, %holder_id, "Release of unlocked seat ignored");
                Ok(true)
            }
            ReleaseOutcome::HeldByOther(record) => {
                LockMetrics::record_release("forbidden");
                warn!(%seat_id, %holder_id, owner = %record.holder_id, "Release refused, lock held by another holder");
                Err(LockError::Forbidden {
                    seat_id,
                    holder_id: holder_id.clone(),
                })
            }
            ReleaseOutcome::SeatNotFound => Err(LockError::SeatNotFound(seat_id)),
        }
    }

    /// Current unexpired lock on a seat.
    ///
    /// An expired lock found here is reclaimed on the spot and reported as
    /// absent. A missing seat is reported as `None`.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Store`] if the cache misses and the durable read fails.
    pub async fn check_lock(&self, seat_id: SeatId) -> Result<Option<LockRecord>> {
        let now = self.clock.now();
        match self.store.lookup(&seat_id, now).await? {
            Lookup::Active(record) => Ok(Some(record)),
            Lookup::Absent => Ok(None),
            Lookup::Expired(_) => match self.reclaim(seat_id, now, "lazy").await {
                Ok(true) => Ok(None),
                // Refreshed elsewhere since the cache saw it; ask the durable tier.
                Ok(false) => match self.store.lookup(&seat_id, now).await? {
                    Lookup::Active(record) => Ok(Some(record)),
                    Lookup::Expired(_) | Lookup::Absent => Ok(None),
                },
                // The lock is expired either way; the sweeper retries the purge.
                Err(e) => {
                    warn!(%seat_id, error = %e, "Lazy reclamation failed");
                    Ok(None)
                }
            },
        }
    }

    /// Classify seats as available, locked or unavailable from one durable read.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Store`] if the durable read fails.
    pub async fn bulk_check_availability(&self, seat_ids: &[SeatId]) -> Result<AvailabilityReport> {
        let now = self.clock.now();
        let snapshots = self.store.load_seats(seat_ids).await?;
        Ok(AvailabilityOracle::classify(seat_ids, snapshots, now))
    }

    /// Hold several seats for one holder, best effort.
    ///
    /// Seats are locked one by one. On the first seat that cannot be locked,
    /// the seats newly locked by this call are released again; seats the
    /// holder already held before the call keep their lock. This is
    /// compensation, not atomicity: observers may see the intermediate locks.
    ///
    /// # Errors
    ///
    /// Same as [`acquire_lock_for`](Self::acquire_lock_for). Seats locked
    /// before the error are released first.
    pub async fn acquire_seats(
        &self,
        seat_ids: &[SeatId],
        holder_id: &HolderId,
        ttl: Duration,
    ) -> Result<GroupHold> {
        let mut seen = HashSet::with_capacity(seat_ids.len());
        let mut held = Vec::with_capacity(seat_ids.len());
        let mut newly_locked = Vec::new();

        for &seat_id in seat_ids.iter().filter(|id| seen.insert(**id)) {
            match self.acquire(seat_id, holder_id, ttl).await {
                Ok(AcquireOutcome::Acquired(_)) => {
                    newly_locked.push(seat_id);
                    held.push(seat_id);
                }
                Ok(AcquireOutcome::Refreshed(_)) => held.push(seat_id),
                Ok(_) => {
                    self.compensate(&newly_locked, holder_id).await;
                    info!(%seat_id, %holder_id, released = newly_locked.len(), "Group hold abandoned");
                    return Ok(GroupHold::Conflict {
                        seat_id,
                        released: newly_locked,
                    });
                }
                Err(e) => {
                    self.compensate(&newly_locked, holder_id).await;
                    return Err(e);
                }
            }
        }

        Ok(GroupHold::Held(held))
    }

    /// Rebuild the cache from the durable tier's active locks.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Store`] if the durable read fails.
    pub async fn warm_cache(&self) -> Result<usize> {
        let count = self.store.warm(self.clock.now()).await?;
        info!(locks = count, "Lock cache warmed");
        Ok(count)
    }

    /// Subscribe to status changes for an event.
    pub async fn subscribe(&self, event_id: EventId) -> Subscription {
        self.hub.subscribe(event_id).await
    }

    /// Clear an expired lock (re-checked at write time) and announce it.
    ///
    /// Returns whether a lock was cleared.
    pub(crate) async fn reclaim(
        &self,
        seat_id: SeatId,
        now: DateTime<Utc>,
        source: &'static str,
    ) -> std::result::Result<bool, StoreError> {
        let Some(cleared) = self.store.reclaim(&seat_id, now).await? else {
            return Ok(false);
        };

        LockMetrics::record_reclaimed(source, 1);
        info!(
            %seat_id,
            holder_id = %cleared.holder_id,
            expires_at = %cleared.expires_at,
            source,
            "Expired lock reclaimed"
        );
        self.hub
            .publish_seat_status(cleared.event_id, seat_id, SeatStatus::Available, None, now)
            .await;
        Ok(true)
    }

    async fn acquire(
        &self,
        seat_id: SeatId,
        holder_id: &HolderId,
        ttl: Duration,
    ) -> Result<AcquireOutcome> {
        if ttl <= Duration::zero() {
            return Err(LockError::InvalidTtl(ttl));
        }

        let now = self.clock.now();
        let Some(event_id) = self.store.event_of(&seat_id, now).await? else {
            return Err(LockError::SeatNotFound(seat_id));
        };

        let Some(claim) = LockRecord::claim(seat_id, event_id, holder_id.clone(), now, ttl) else {
            return Err(LockError::InvalidTtl(ttl));
        };
        let outcome = self.store.acquire(&claim, now).await?;

        match &outcome {
            AcquireOutcome::Acquired(record) => {
                LockMetrics::record_acquire("acquired");
                info!(%seat_id, %holder_id, expires_at = %record.expires_at, "Lock acquired");
                self.hub
                    .publish_seat_status(
                        record.event_id,
                        seat_id,
                        SeatStatus::Locked,
                        Some(holder_id.clone()),
                        now,
                    )
                    .await;
            }
            AcquireOutcome::Refreshed(record) => {
                LockMetrics::record_acquire("refreshed");
                debug!(%seat_id, %holder_id, expires_at = %record.expires_at, "Lock refreshed");
            }
            AcquireOutcome::HeldByOther(record) => {
                LockMetrics::record_acquire("conflict");
                debug!(%seat_id, %holder_id, owner = %record.holder_id, "Seat already locked");
            }
            AcquireOutcome::NotLockable(status) => {
                LockMetrics::record_acquire("not_lockable");
                debug!(%seat_id, %holder_id, %status, "Seat not lockable");
            }
            AcquireOutcome::SeatNotFound => return Err(LockError::SeatNotFound(seat_id)),
        }

        Ok(outcome)
    }

    async fn compensate(&self, seat_ids: &[SeatId], holder_id: &HolderId) {
        for &seat_id in seat_ids {
            // Left to expire on failure; the TTL bounds how long it stays held.
            if let Err(e) = self.release_lock(seat_id, holder_id).await {
                error!(%seat_id, %holder_id, error = %e, "Failed to release seat of abandoned group hold");
            }
        }
    }
}
