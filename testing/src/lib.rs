//! # Seatlock Testing
//!
//! Testing utilities and helpers for the seat lock subsystem.
//!
//! This crate provides:
//! - Deterministic clocks ([`FixedClock`], [`ManualClock`])
//! - An in-memory durable tier with failure injection ([`InMemoryLockStore`])
//! - Seat fixtures
//!
//! ## Example
//!
//! ```ignore
//! use seatlock_testing::{InMemoryLockStore, ManualClock, fixtures};
//!
//! #[tokio::test]
//! async fn lock_expires() {
//!     let clock = ManualClock::default();
//!     let store = InMemoryLockStore::new();
//!     let seat = fixtures::seat(&store, EventId::new());
//!     // ... build a LockManager, acquire, then:
//!     clock.advance(chrono::Duration::seconds(301));
//! }
//! ```

use chrono::{DateTime, Duration, Utc};
use seatlock_core::environment::Clock;
use std::sync::{Arc, Mutex, PoisonError};

pub mod lock_store;

pub use lock_store::InMemoryLockStore;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Arc, Clock, DateTime, Duration, Mutex, PoisonError, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use seatlock_testing::mocks::FixedClock;
    /// use seatlock_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when the test advances it.
    ///
    /// Clones share the same time, so a test can keep one handle and give
    /// another to the code under test.
    ///
    /// # Example
    ///
    /// ```
    /// use seatlock_testing::mocks::ManualClock;
    /// use seatlock_core::environment::Clock;
    /// use chrono::Duration;
    ///
    /// let clock = ManualClock::default();
    /// let start = clock.now();
    /// clock.advance(Duration::seconds(6));
    /// assert_eq!(clock.now() - start, Duration::seconds(6));
    /// ```
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a manual clock starting at `start`
        #[must_use]
        pub fn new(start: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(start)),
            }
        }

        /// Move time forward by `by`
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }

        /// Jump to an absolute time
        pub fn set(&self, to: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = to;
        }
    }

    impl Default for ManualClock {
        fn default() -> Self {
            Self::new(super::test_time())
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }
}

/// Seat fixtures
pub mod fixtures {
    use super::InMemoryLockStore;
    use seatlock_core::{EventId, Money, Seat, SeatId};

    /// Insert an available seat for `event_id` and return its id.
    #[must_use]
    pub fn seat(store: &InMemoryLockStore, event_id: EventId) -> SeatId {
        let seat = Seat::available(event_id, "General", Money::from_cents(5_000));
        let id = seat.id;
        store.insert_seat(seat);
        id
    }

    /// Insert `count` available seats for `event_id`.
    #[must_use]
    pub fn seats(store: &InMemoryLockStore, event_id: EventId, count: usize) -> Vec<SeatId> {
        (0..count).map(|_| seat(store, event_id)).collect()
    }
}

/// Start time of [`test_clock`] and `ManualClock::default()` (2025-01-01 00:00:00 UTC).
#[must_use]
pub fn test_time() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap_or_default()
}

/// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
#[must_use]
pub fn test_clock() -> FixedClock {
    FixedClock::new(test_time())
}

/// Install a `tracing` subscriber that writes to the test harness output.
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seatlock=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FixedClock, ManualClock};
