//! Application state for Axum handlers.

use crate::config::LockConfig;
use seatlock_runtime::{LockManager, MetricsServer};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Application state shared across all HTTP handlers.
///
/// Generic over the durable tier so tests can serve the same router over the
/// in-memory store.
pub struct AppState<S> {
    /// Lock operations and the broadcast hub
    pub manager: LockManager<S>,
    /// TTL bounds and WebSocket limits
    pub locks: Arc<LockConfig>,
    /// Prometheus renderer, when the recorder was installed by this process
    pub metrics: Option<Arc<MetricsServer>>,
    /// One permit per open WebSocket subscription
    pub ws_slots: Arc<Semaphore>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            locks: Arc::clone(&self.locks),
            metrics: self.metrics.clone(),
            ws_slots: Arc::clone(&self.ws_slots),
        }
    }
}

impl<S> AppState<S> {
    /// Create application state.
    #[must_use]
    pub fn new(manager: LockManager<S>, locks: LockConfig) -> Self {
        let ws_slots = Arc::new(Semaphore::new(locks.ws_max_connections));
        Self {
            manager,
            locks: Arc::new(locks),
            metrics: None,
            ws_slots,
        }
    }

    /// Serve `GET /metrics` from this renderer.
    #[must_use]
    pub fn with_metrics(mut self, metrics: MetricsServer) -> Self {
        self.metrics = Some(Arc::new(metrics));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use seatlock_runtime::BroadcastHub;
    use seatlock_testing::{InMemoryLockStore, ManualClock};

    #[test]
    fn test_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState<InMemoryLockStore>>();
    }

    #[test]
    fn test_ws_slots_follow_config() {
        let mut locks = Config::default().locks;
        locks.ws_max_connections = 3;
        let manager = LockManager::new(
            InMemoryLockStore::new(),
            Arc::new(BroadcastHub::default()),
            Arc::new(ManualClock::default()),
        );

        let state = AppState::new(manager, locks);

        assert_eq!(state.ws_slots.available_permits(), 3);
    }
}
