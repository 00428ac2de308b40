//! Expiry sweeper.
//!
//! A background task that reclaims locks whose TTL has elapsed. Each sweep:
//!
//! 1. clears expired entries found in the cache
//! 2. clears expired records in the durable tier that step 1 did not visit
//!    (cache misses, other instances, restarts)
//!
//! Every clear re-checks expiry at write time, so a lock refreshed between
//! the scan and the clear survives. A failure on one seat is logged and
//! counted; the sweep moves on and the next run retries.
//!
//! The task is started and stopped as a whole. A sweep in progress always
//! runs to completion; stop takes effect between sweeps.

use crate::manager::LockManager;
use crate::metrics::SweepMetrics;
use seatlock_core::{LockRecord, LockStore, SeatId, StoreError};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Default time between sweeps.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Locks cleared
    pub reclaimed: usize,
    /// Seats (or scans) that failed and were skipped
    pub failures: usize,
}

struct Running {
    shutdown: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

/// Recurring reclamation of expired locks.
pub struct ExpirySweeper<S> {
    manager: LockManager<S>,
    interval: Duration,
    running: Mutex<Option<Running>>,
}

impl<S: LockStore + 'static> ExpirySweeper<S> {
    /// Create a stopped sweeper that runs every `interval` once started.
    #[must_use]
    pub fn new(manager: LockManager<S>, interval: Duration) -> Self {
        Self {
            manager,
            interval: interval.max(Duration::from_millis(1)),
            running: Mutex::new(None),
        }
    }

    /// Create a stopped sweeper with the default interval.
    #[must_use]
    pub fn for_manager(manager: LockManager<S>) -> Self {
        Self::new(manager, DEFAULT_INTERVAL)
    }

    /// Time between sweeps.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the background task is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running()
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// Start the background task. The first sweep runs immediately.
    ///
    /// Returns `false` if it was already running. Must be called from within
    /// a Tokio runtime.
    pub fn start(&self) -> bool {
        let mut running = self.running();
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return false;
        }

        let (shutdown, mut shutdown_rx) = broadcast::channel(1);
        let manager = self.manager.clone();
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = ticker.tick() => {
                        sweep(&manager).await;
                    }
                }
            }
            debug!("Expiry sweeper loop exited");
        });

        *running = Some(Running { shutdown, handle });
        info!(interval_secs = interval.as_secs_f64(), "Expiry sweeper started");
        true
    }

    /// Stop the background task and wait for it to finish.
    ///
    /// A sweep in progress completes first. Stopping a stopped sweeper is a
    /// no-op.
    pub async fn stop(&self) {
        let Some(Running { shutdown, handle }) = self.running().take() else {
            return;
        };

        // Err only means the loop already exited.
        let _ = shutdown.send(());
        if let Err(e) = handle.await {
            warn!(error = %e, "Expiry sweeper task failed");
        }
        info!("Expiry sweeper stopped");
    }

    /// Run one sweep now, independent of the background task.
    pub async fn sweep_once(&self) -> SweepReport {
        sweep(&self.manager).await
    }

    fn running(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn sweep<S: LockStore>(manager: &LockManager<S>) -> SweepReport {
    let started = Instant::now();
    let now = manager.now();
    let mut report = SweepReport::default();
    let mut visited: HashSet<SeatId> = HashSet::new();

    for record in manager.store().cached_expired(now) {
        visited.insert(record.seat_id);
        let result = manager.reclaim(record.seat_id, now, "sweep").await;
        tally(&mut report, &record, result);
    }

    match manager.store().durable_expired(now).await {
        Ok(records) => {
            for record in records.into_iter().filter(|r| visited.insert(r.seat_id)) {
                let result = manager.reclaim(record.seat_id, now, "sweep").await;
                tally(&mut report, &record, result);
            }
        }
        Err(e) => {
            report.failures += 1;
            warn!(error = %e, "Durable expiry scan failed, retrying next sweep");
        }
    }

    let elapsed = started.elapsed();
    SweepMetrics::record_sweep(elapsed, report.failures);
    if report.reclaimed > 0 || report.failures > 0 {
        info!(
            reclaimed = report.reclaimed,
            failures = report.failures,
            elapsed_ms = elapsed.as_millis(),
            "Expiry sweep finished"
        );
    } else {
        debug!(elapsed_ms = elapsed.as_millis(), "Expiry sweep found nothing");
    }
    report
}

fn tally(report: &mut SweepReport, record: &LockRecord, result: Result<bool, StoreError>) {
    match result {
        Ok(true) => report.reclaimed += 1,
        Ok(false) => {
            debug!(seat_id = %record.seat_id, "Lock changed since scan, left alone");
        }
        Err(e) => {
            report.failures += 1;
            warn!(seat_id = %record.seat_id, error = %e, "Failed to reclaim expired lock");
        }
    }
}
