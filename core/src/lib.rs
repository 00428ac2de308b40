//! # Seatlock Core
//!
//! Core types and traits for the seat lock subsystem.
//!
//! This crate defines the vocabulary shared by every other crate in the workspace:
//!
//! - **Seat**: a sellable inventory unit and its [`SeatStatus`](types::SeatStatus)
//! - **Lock record**: a time-bounded exclusive claim on one seat by one holder
//! - **Lock store**: the durable tier (system of record) behind the [`LockStore`](store::LockStore) trait
//! - **Status messages**: what the broadcast hub pushes to observers
//! - **Environment**: injected dependencies such as the [`Clock`](environment::Clock)
//!
//! ## Consistency Model
//!
//! - The durable tier is authoritative. Every mutation is a per-seat
//!   compare-and-set, never a process-wide mutex.
//! - A lock whose `expires_at` has passed is treated as absent everywhere.
//! - A conflict is a normal outcome (`false`), not an error.
//!
//! ## Example
//!
//! ```ignore
//! use seatlock_core::store::{AcquireOutcome, LockStore};
//!
//! async fn claim(store: &impl LockStore, claim: &LockRecord) -> Result<bool, StoreError> {
//!     let outcome = store.try_acquire(claim, claim.acquired_at).await?;
//!     Ok(matches!(outcome, AcquireOutcome::Acquired(_) | AcquireOutcome::Refreshed(_)))
//! }
//! ```

#![forbid(unsafe_code)]

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub mod error;
pub mod message;
pub mod store;
pub mod types;

pub use error::{LockError, StoreError};
pub use message::StatusMessage;
pub use store::{AcquireOutcome, LockStore, ReleaseOutcome};
pub use types::{
    BookingId, EventId, HolderId, LockRecord, Money, Seat, SeatId, SeatSnapshot, SeatStatus,
};

/// Environment module - Dependency injection traits
///
/// All time-dependent decisions (lock expiry, sweep cut-offs, broadcast
/// timestamps) read the time through [`Clock`](environment::Clock) so tests can
/// drive expiry deterministically instead of sleeping.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use seatlock_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let earlier = clock.now();
    /// assert!(clock.now() >= earlier);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
