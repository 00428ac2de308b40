//! Prometheus metrics for the lock subsystem.
//!
//! This module provides metric collection for:
//! - Lock acquisitions and releases
//! - Expiry reclamation (sweeper and lazy purge)
//! - Broadcast fan-out
//! - Cache hit rate and durable tier errors
//!
//! # Example
//!
//! ```rust,no_run
//! use seatlock_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Rendered text is served by the web layer at /metrics
//! let _body = server.render();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics recorder and renderer.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// `addr` is only reported in logs; rendering is served by the web layer.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Describe all metrics and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// A recorder that is already installed (e.g. by another test) is not an
    /// error; [`render`](Self::render) then returns `None` for this instance.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this instance did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    // Locks
    describe_counter!(
        "seatlock_lock_acquisitions_total",
        "Lock acquisition attempts by outcome"
    );
    describe_counter!(
        "seatlock_lock_releases_total",
        "Lock release attempts by outcome"
    );
    describe_counter!(
        "seatlock_locks_reclaimed_total",
        "Expired locks reclaimed, by source (sweep or lazy)"
    );

    // Sweeper
    describe_counter!(
        "seatlock_sweep_failures_total",
        "Per-seat failures during expiry sweeps"
    );
    describe_histogram!(
        "seatlock_sweep_duration_seconds",
        "Time taken by one expiry sweep"
    );

    // Broadcast
    describe_counter!(
        "seatlock_broadcasts_total",
        "Status messages published, by kind"
    );
    describe_counter!(
        "seatlock_subscriber_lag_total",
        "Messages skipped by lagging subscribers"
    );
    describe_gauge!(
        "seatlock_broadcast_channels",
        "Events with at least one open broadcast channel"
    );

    // Cache and store
    describe_counter!(
        "seatlock_cache_lookups_total",
        "Lock cache lookups by result (hit or miss)"
    );
    describe_gauge!("seatlock_cached_locks", "Entries in the lock cache");
    describe_counter!(
        "seatlock_store_errors_total",
        "Durable tier failures by operation"
    );
}

/// Lock operation metrics recorder.
pub struct LockMetrics;

impl LockMetrics {
    /// Record an acquisition attempt (`acquired`, `refreshed`, `conflict`, ...).
    pub fn record_acquire(outcome: &'static str) {
        counter!("seatlock_lock_acquisitions_total", "outcome" => outcome).increment(1);
    }

    /// Record a release attempt (`released`, `not_held`, `forbidden`, ...).
    pub fn record_release(outcome: &'static str) {
        counter!("seatlock_lock_releases_total", "outcome" => outcome).increment(1);
    }

    /// Record reclaimed locks (`sweep` or `lazy`).
    pub fn record_reclaimed(source: &'static str, count: usize) {
        counter!("seatlock_locks_reclaimed_total", "source" => source).increment(count as u64);
    }

    /// Record a cache lookup.
    pub fn record_cache_lookup(hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        counter!("seatlock_cache_lookups_total", "result" => result).increment(1);
    }

    /// Record a durable tier failure.
    pub fn record_store_error(operation: &'static str) {
        counter!("seatlock_store_errors_total", "operation" => operation).increment(1);
    }
}

/// Sweeper metrics recorder.
pub struct SweepMetrics;

impl SweepMetrics {
    /// Record one completed sweep.
    pub fn record_sweep(duration: Duration, failures: usize) {
        histogram!("seatlock_sweep_duration_seconds").record(duration.as_secs_f64());
        counter!("seatlock_sweep_failures_total").increment(failures as u64);
    }
}

/// Broadcast metrics recorder.
pub struct BroadcastMetrics;

impl BroadcastMetrics {
    /// Record a published message.
    pub fn record_publish(kind: &'static str) {
        counter!("seatlock_broadcasts_total", "kind" => kind).increment(1);
    }

    /// Record messages skipped by a lagging subscriber.
    pub fn record_lag(skipped: u64) {
        counter!("seatlock_subscriber_lag_total").increment(skipped);
    }

    /// Record the number of open channels.
    #[allow(clippy::cast_precision_loss)]
    pub fn record_channels(count: usize) {
        gauge!("seatlock_broadcast_channels").set(count as f64);
    }
}
