//! Error types for lock operations.

use crate::types::{HolderId, SeatId};
use thiserror::Error;

/// Errors raised by the durable lock store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached
    #[error("Connection failed: {0}")]
    Connection(String),

    /// A query or write failed
    #[error("Database error: {0}")]
    Database(String),

    /// A stored row could not be decoded into domain types
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Errors surfaced by the lock manager.
///
/// A lock conflict is not an error: `acquire_lock` reports it as `Ok(false)`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// The seat does not exist in the catalog
    #[error("Seat {0} not found")]
    SeatNotFound(SeatId),

    /// The caller tried to release a lock held by someone else
    #[error("Seat {seat_id} is locked by another holder; {holder_id} may not release it")]
    Forbidden {
        /// Seat the caller tried to release
        seat_id: SeatId,
        /// Caller that is not the owner
        holder_id: HolderId,
    },

    /// TTL was not positive or its expiry is not representable
    #[error("Lock TTL out of range: {0}")]
    InvalidTtl(chrono::Duration),

    /// The durable tier failed; no state was changed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type alias for lock manager operations.
pub type Result<T> = std::result::Result<T, LockError>;
