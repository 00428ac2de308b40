//! `PostgreSQL` durable tier for seat locks.
//!
//! This crate implements the `LockStore` trait from `seatlock-core` on top of
//! a `seats` table that carries the lock inline:
//!
//! - Every conditional write runs in a transaction that takes the seat row
//!   with `SELECT ... FOR UPDATE`, so two writers on one seat are serialized
//!   by the database and writers on different seats never block each other
//! - A CHECK constraint ties `status = 'locked'` to the presence of the lock
//!   columns, so status and lock record cannot diverge
//! - Migrations are embedded with `sqlx::migrate!`
//!
//! # Example
//!
//! ```no_run
//! use seatlock_postgres::PostgresLockStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PostgresLockStore::new("postgres://localhost/seatlock").await?;
//! store.migrate().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use chrono::{DateTime, Utc};
use seatlock_core::store::{AcquireOutcome, LockStore, ReleaseOutcome};
use seatlock_core::{
    EventId, HolderId, LockRecord, Money, Seat, SeatId, SeatSnapshot, SeatStatus, StoreError,
};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

const SELECT_SEATS: &str = r"
    SELECT seat_id, event_id, category, price_cents, status,
           lock_holder, lock_acquired_at, lock_expires_at
    FROM seats
";

/// `PostgreSQL`-backed [`LockStore`].
#[derive(Clone)]
pub struct PostgresLockStore {
    pool: PgPool,
}

impl PostgresLockStore {
    /// Connect to the database at `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the pool cannot connect.
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Use an existing connection pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns error if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Insert or update a seat's catalog data.
    ///
    /// Used by the catalog and by tests; an existing seat keeps its status
    /// and lock.
    ///
    /// # Errors
    ///
    /// Returns error if the write fails or the price does not fit the column.
    pub async fn upsert_seat(&self, seat: &Seat) -> Result<(), StoreError> {
        let price = i64::try_from(seat.price.cents())
            .map_err(|_| StoreError::Database(format!("Price out of range: {}", seat.price)))?;

        sqlx::query(
            r"
            INSERT INTO seats (seat_id, event_id, category, price_cents, status)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (seat_id)
            DO UPDATE SET
                category = EXCLUDED.category,
                price_cents = EXCLUDED.price_cents,
                updated_at = now()
            ",
        )
        .bind(seat.id.as_uuid())
        .bind(seat.event_id.as_uuid())
        .bind(&seat.category)
        .bind(price)
        .bind(seat.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_error("upsert seat"))?;
        Ok(())
    }

    /// Move a seat to `status`, dropping any lock, the way the booking or
    /// admin workflow does.
    ///
    /// Returns `false` if the seat does not exist.
    ///
    /// # Errors
    ///
    /// Returns error if the write fails.
    pub async fn set_status(&self, seat_id: &SeatId, status: SeatStatus) -> Result<bool, StoreError> {
        if status == SeatStatus::Locked {
            return Err(StoreError::Database(
                "Locked status is only set through try_acquire".to_string(),
            ));
        }

        let result = sqlx::query(
            r"
            UPDATE seats
            SET status = $2,
                lock_holder = NULL,
                lock_acquired_at = NULL,
                lock_expires_at = NULL,
                updated_at = now()
            WHERE seat_id = $1
            ",
        )
        .bind(seat_id.as_uuid())
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_error("set status"))?;

        Ok(result.rows_affected() == 1)
    }

    /// Lock a seat row, apply `apply` to it and persist the row if `is_write`
    /// says it changed.
    ///
    /// Returns `None` if the seat does not exist.
    async fn with_seat_locked<T>(
        &self,
        seat_id: &SeatId,
        apply: impl FnOnce(&mut SeatSnapshot) -> T + Send,
        is_write: impl FnOnce(&T) -> bool + Send,
    ) -> Result<Option<T>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error("begin"))?;

        let row = sqlx::query(&format!("{SELECT_SEATS} WHERE seat_id = $1 FOR UPDATE"))
            .bind(seat_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error("lock seat row"))?;

        let Some(row) = row else {
            let _ = tx.rollback().await; // Ignore rollback errors
            return Ok(None);
        };

        let mut snapshot = row_to_snapshot(&row)?;
        let outcome = apply(&mut snapshot);

        if is_write(&outcome) {
            write_lock(&mut tx, &snapshot).await?;
            tx.commit().await.map_err(db_error("commit"))?;
        } else {
            let _ = tx.rollback().await; // Ignore rollback errors
        }

        Ok(Some(outcome))
    }

    async fn fetch_locks(&self, predicate: &str, now: DateTime<Utc>) -> Result<Vec<LockRecord>, StoreError> {
        let rows = sqlx::query(&format!("{SELECT_SEATS} WHERE status = 'locked' AND {predicate}"))
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("scan locks"))?;

        rows.iter()
            .map(|row| row_to_snapshot(row).map(|snapshot| snapshot.lock))
            .filter_map(Result::transpose)
            .collect()
    }
}

impl LockStore for PostgresLockStore {
    async fn load_seat(&self, seat_id: &SeatId) -> Result<Option<SeatSnapshot>, StoreError> {
        let row = sqlx::query(&format!("{SELECT_SEATS} WHERE seat_id = $1"))
            .bind(seat_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("load seat"))?;

        row.as_ref().map(row_to_snapshot).transpose()
    }

    async fn load_seats(&self, seat_ids: &[SeatId]) -> Result<Vec<SeatSnapshot>, StoreError> {
        let ids: Vec<Uuid> = seat_ids.iter().map(|id| *id.as_uuid()).collect();

        let rows = sqlx::query(&format!("{SELECT_SEATS} WHERE seat_id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("load seats"))?;

        rows.iter().map(row_to_snapshot).collect()
    }

    async fn try_acquire(
        &self,
        claim: &LockRecord,
        now: DateTime<Utc>,
    ) -> Result<AcquireOutcome, StoreError> {
        let outcome = self
            .with_seat_locked(
                &claim.seat_id,
                |row| row.apply_acquire(claim, now),
                AcquireOutcome::is_write,
            )
            .await?;

        if let Some(AcquireOutcome::Acquired(record)) = &outcome {
            tracing::debug!(seat_id = %record.seat_id, holder_id = %record.holder_id, "Lock row written");
        }
        Ok(outcome.unwrap_or(AcquireOutcome::SeatNotFound))
    }

    async fn release(
        &self,
        seat_id: &SeatId,
        holder_id: &HolderId,
        now: DateTime<Utc>,
    ) -> Result<ReleaseOutcome, StoreError> {
        let outcome = self
            .with_seat_locked(
                seat_id,
                |row| row.apply_release(holder_id, now),
                ReleaseOutcome::is_write,
            )
            .await?;
        Ok(outcome.unwrap_or(ReleaseOutcome::SeatNotFound))
    }

    async fn clear_expired(
        &self,
        seat_id: &SeatId,
        now: DateTime<Utc>,
    ) -> Result<Option<LockRecord>, StoreError> {
        let cleared = self
            .with_seat_locked(seat_id, |row| row.apply_clear_expired(now), Option::is_some)
            .await?;
        Ok(cleared.flatten())
    }

    async fn expired_locks(&self, now: DateTime<Utc>) -> Result<Vec<LockRecord>, StoreError> {
        self.fetch_locks("lock_expires_at <= $1", now).await
    }

    async fn active_locks(&self, now: DateTime<Utc>) -> Result<Vec<LockRecord>, StoreError> {
        self.fetch_locks("lock_expires_at > $1", now).await
    }
}

async fn write_lock(
    tx: &mut Transaction<'_, Postgres>,
    snapshot: &SeatSnapshot,
) -> Result<(), StoreError> {
    let lock = snapshot.lock.as_ref();

    sqlx::query(
        r"
        UPDATE seats
        SET status = $2,
            lock_holder = $3,
            lock_acquired_at = $4,
            lock_expires_at = $5,
            updated_at = now()
        WHERE seat_id = $1
        ",
    )
    .bind(snapshot.seat.id.as_uuid())
    .bind(snapshot.seat.status.as_str())
    .bind(lock.map(|l| l.holder_id.as_str()))
    .bind(lock.map(|l| l.acquired_at))
    .bind(lock.map(|l| l.expires_at))
    .execute(&mut **tx)
    .await
    .map_err(db_error("write lock"))?;

    Ok(())
}

fn row_to_snapshot(row: &PgRow) -> Result<SeatSnapshot, StoreError> {
    let seat_id = SeatId::from_uuid(get(row, "seat_id")?);
    let event_id = EventId::from_uuid(get(row, "event_id")?);
    let price: i64 = get(row, "price_cents")?;
    let status: String = get(row, "status")?;

    let seat = Seat {
        id: seat_id,
        event_id,
        category: get(row, "category")?,
        price: Money::from_cents(
            u64::try_from(price)
                .map_err(|_| StoreError::Corrupt(format!("Negative price on seat {seat_id}")))?,
        ),
        status: SeatStatus::parse(&status)?,
    };

    let holder: Option<String> = get(row, "lock_holder")?;
    let acquired_at: Option<DateTime<Utc>> = get(row, "lock_acquired_at")?;
    let expires_at: Option<DateTime<Utc>> = get(row, "lock_expires_at")?;

    let lock = match (holder, acquired_at, expires_at) {
        (Some(holder), Some(acquired_at), Some(expires_at)) => Some(LockRecord {
            seat_id,
            event_id,
            holder_id: HolderId::new(holder),
            acquired_at,
            expires_at,
        }),
        (None, None, None) => None,
        _ => {
            return Err(StoreError::Corrupt(format!(
                "Partial lock columns on seat {seat_id}"
            )));
        }
    };

    Ok(SeatSnapshot { seat, lock })
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Corrupt(format!("Column {column}: {e}")))
}

fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> StoreError {
    move |e| match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
            StoreError::Connection(format!("{context}: {e}"))
        }
        other => StoreError::Database(format!("{context}: {other}")),
    }
}
