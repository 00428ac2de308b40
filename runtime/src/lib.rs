//! # Seatlock Runtime
//!
//! Runtime components of the seat lock subsystem.
//!
//! ## Core Components
//!
//! - **`LockManager`**: acquire, release, check and bulk-check seat locks
//! - **`TieredLockStore`**: durable tier plus the volatile [`LockCache`]
//! - **`ExpirySweeper`**: background reclamation of expired locks
//! - **`BroadcastHub`**: per-event, at-most-once status fan-out
//! - **`AvailabilityOracle`**: point-in-time classification of many seats
//!
//! ## Example
//!
//! ```ignore
//! use seatlock_runtime::{BroadcastHub, ExpirySweeper, LockManager};
//! use seatlock_core::environment::SystemClock;
//! use std::sync::Arc;
//!
//! let manager = LockManager::new(store, Arc::new(BroadcastHub::default()), Arc::new(SystemClock));
//! manager.warm_cache().await?;
//!
//! let sweeper = ExpirySweeper::for_manager(manager.clone());
//! sweeper.start();
//!
//! if manager.acquire_lock(seat_id, &holder).await? {
//!     // proceed to create the pending booking
//! }
//! ```

#![forbid(unsafe_code)]

/// Bulk availability classification
pub mod availability;

/// Volatile tier of the lock store
pub mod cache;

/// Event-scoped broadcast of status changes
pub mod hub;

/// Public lock operations
pub mod manager;

/// Prometheus metrics for observability
pub mod metrics;

/// Background reclamation of expired locks
pub mod sweeper;

/// Durable tier plus cache
pub mod tiered;

pub use availability::{AvailabilityOracle, AvailabilityReport, LockedSeat};
pub use cache::{Generation, LockCache};
pub use hub::{BroadcastHub, Subscription};
pub use manager::{GroupHold, LockManager};
pub use metrics::{MetricsError, MetricsServer};
pub use sweeper::{ExpirySweeper, SweepReport};
pub use tiered::{Lookup, TieredLockStore};
