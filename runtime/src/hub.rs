//! Event-scoped broadcast hub.
//!
//! Each event gets its own `tokio::sync::broadcast` channel, created on first
//! subscription. Delivery is at-most-once:
//!
//! - a message published while nobody is subscribed is dropped
//! - a subscriber that falls more than `capacity` messages behind skips the
//!   oldest ones and keeps going
//! - nothing is replayed to late subscribers
//!
//! Every subscriber is expected to reconcile with a bulk availability check
//! when it (re)connects.
//!
//! # Example
//!
//! ```ignore
//! let hub = BroadcastHub::new(256);
//! let mut subscription = hub.subscribe(event_id).await;
//!
//! hub.publish_seat_status(event_id, seat_id, SeatStatus::Locked, Some(holder), now).await;
//!
//! while let Some(message) = subscription.recv().await {
//!     // forward to the client
//! }
//! ```

use crate::metrics::BroadcastMetrics;
use chrono::{DateTime, Utc};
use seatlock_core::{BookingId, EventId, HolderId, SeatId, SeatStatus, StatusMessage};
use std::collections::HashMap;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, warn};

/// Default per-channel buffer.
pub const DEFAULT_CAPACITY: usize = 256;

/// Fan-out of [`StatusMessage`]s to per-event channels.
pub struct BroadcastHub {
    channels: RwLock<HashMap<EventId, broadcast::Sender<StatusMessage>>>,
    capacity: usize,
}

impl BroadcastHub {
    /// Create a hub whose channels buffer `capacity` messages each.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to an event's channel, creating it if needed.
    pub async fn subscribe(&self, event_id: EventId) -> Subscription {
        let mut channels = self.channels.write().await;
        let receiver = channels
            .entry(event_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        BroadcastMetrics::record_channels(channels.len());
        drop(channels);

        debug!(%event_id, "Subscriber joined");
        Subscription { event_id, receiver }
    }

    /// Publish a message on an event's channel.
    ///
    /// Returns the number of subscribers the message was handed to. Zero is
    /// not an error. Channels whose subscribers have all gone are dropped.
    pub async fn publish(&self, event_id: EventId, message: StatusMessage) -> usize {
        let kind = message.kind();
        let delivered = {
            let channels = self.channels.read().await;
            match channels.get(&event_id) {
                Some(sender) => sender.send(message).ok(),
                None => Some(0),
            }
        };
        BroadcastMetrics::record_publish(kind);

        match delivered {
            Some(count) => {
                debug!(%event_id, kind, subscribers = count, "Status message published");
                count
            }
            None => {
                self.prune(event_id).await;
                0
            }
        }
    }

    /// Publish a `seat-status-change`.
    pub async fn publish_seat_status(
        &self,
        event_id: EventId,
        seat_id: SeatId,
        status: SeatStatus,
        holder_id: Option<HolderId>,
        timestamp: DateTime<Utc>,
    ) -> usize {
        let message = StatusMessage::SeatStatusChange {
            seat_id,
            status,
            holder_id,
            timestamp,
        };
        self.publish(event_id, message).await
    }

    /// Publish a `booking-status-change` on behalf of the booking workflow.
    pub async fn publish_booking_status(
        &self,
        event_id: EventId,
        booking_id: BookingId,
        status: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> usize {
        let message = StatusMessage::BookingStatusChange {
            booking_id,
            status: status.into(),
            timestamp,
        };
        self.publish(event_id, message).await
    }

    /// Number of events with an open channel.
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }

    /// Number of live subscribers on an event's channel.
    pub async fn subscriber_count(&self, event_id: EventId) -> usize {
        self.channels
            .read()
            .await
            .get(&event_id)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    async fn prune(&self, event_id: EventId) {
        let mut channels = self.channels.write().await;
        // A subscriber may have joined between the send and this write lock.
        if channels
            .get(&event_id)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(&event_id);
            debug!(%event_id, "Dropped idle channel");
        }
        BroadcastMetrics::record_channels(channels.len());
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// One observer's view of an event channel.
pub struct Subscription {
    event_id: EventId,
    receiver: broadcast::Receiver<StatusMessage>,
}

impl Subscription {
    /// Event this subscription listens to.
    #[must_use]
    pub const fn event_id(&self) -> EventId {
        self.event_id
    }

    /// Next message, or `None` once the hub is gone.
    ///
    /// Messages dropped because this subscriber lagged are skipped.
    pub async fn recv(&mut self) -> Option<StatusMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(event_id = %self.event_id, skipped, "Subscriber lagged, messages dropped");
                    BroadcastMetrics::record_lag(skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn messages_stay_on_their_event_channel() {
        let hub = BroadcastHub::default();
        let event_a = EventId::new();
        let event_b = EventId::new();
        let mut sub_a = hub.subscribe(event_a).await;
        let mut sub_b = hub.subscribe(event_b).await;

        let seat = SeatId::new();
        hub.publish_seat_status(event_a, seat, SeatStatus::Locked, None, Utc::now())
            .await;
        hub.publish_booking_status(event_b, BookingId::new(), "confirmed", Utc::now())
            .await;

        let got_a = sub_a.recv().await.unwrap();
        assert!(matches!(got_a, StatusMessage::SeatStatusChange { seat_id, .. } if seat_id == seat));
        let got_b = sub_b.recv().await.unwrap();
        assert_eq!(got_b.kind(), "booking-status-change");
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_not_an_error() {
        let hub = BroadcastHub::default();
        let delivered = hub
            .publish_seat_status(EventId::new(), SeatId::new(), SeatStatus::Available, None, Utc::now())
            .await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn idle_channel_is_pruned_on_publish() {
        let hub = BroadcastHub::default();
        let event = EventId::new();
        drop(hub.subscribe(event).await);
        assert_eq!(hub.channel_count().await, 1);

        hub.publish_seat_status(event, SeatId::new(), SeatStatus::Available, None, Utc::now())
            .await;

        assert_eq!(hub.channel_count().await, 0);
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_to_latest() {
        let hub = BroadcastHub::new(2);
        let event = EventId::new();
        let mut subscription = hub.subscribe(event).await;

        let seats: Vec<SeatId> = (0..5).map(|_| SeatId::new()).collect();
        for seat in &seats {
            hub.publish_seat_status(event, *seat, SeatStatus::Locked, None, Utc::now())
                .await;
        }

        // Only the last `capacity` messages survive.
        let first = subscription.recv().await.unwrap();
        assert!(matches!(first, StatusMessage::SeatStatusChange { seat_id, .. } if seat_id == seats[3]));
        let second = subscription.recv().await.unwrap();
        assert!(matches!(second, StatusMessage::SeatStatusChange { seat_id, .. } if seat_id == seats[4]));
    }
}
