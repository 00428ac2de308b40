//! Integration tests for status broadcasts triggered by lock changes.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use chrono::Duration;
use seatlock_core::{EventId, HolderId, SeatStatus, StatusMessage};
use seatlock_runtime::{BroadcastHub, ExpirySweeper, LockManager, Subscription};
use seatlock_testing::{InMemoryLockStore, ManualClock, fixtures};
use std::sync::Arc;

fn setup() -> (LockManager<InMemoryLockStore>, InMemoryLockStore, ManualClock) {
    let durable = InMemoryLockStore::new();
    let clock = ManualClock::default();
    let manager = LockManager::new(
        durable.clone(),
        Arc::new(BroadcastHub::new(16)),
        Arc::new(clock.clone()),
    );
    (manager, durable, clock)
}

async fn next_seat_status(subscription: &mut Subscription) -> (SeatStatus, Option<HolderId>) {
    let message = tokio::time::timeout(std::time::Duration::from_secs(1), subscription.recv())
        .await
        .expect("timed out waiting for broadcast")
        .expect("hub closed");
    match message {
        StatusMessage::SeatStatusChange {
            status, holder_id, ..
        } => (status, holder_id),
        other => panic!("unexpected message: {other:?}"),
    }
}

#[tokio::test]
async fn lock_and_release_are_broadcast_to_event_subscribers() {
    let (manager, durable, _) = setup();
    let event = EventId::new();
    let seat = fixtures::seat(&durable, event);
    let holder = HolderId::new("alice");
    let mut subscription = manager.subscribe(event).await;

    manager.acquire_lock(seat, &holder).await.unwrap();
    manager.release_lock(seat, &holder).await.unwrap();

    assert_eq!(
        next_seat_status(&mut subscription).await,
        (SeatStatus::Locked, Some(holder))
    );
    assert_eq!(
        next_seat_status(&mut subscription).await,
        (SeatStatus::Available, None)
    );
}

#[tokio::test]
async fn conflict_is_not_broadcast() {
    let (manager, durable, _) = setup();
    let event = EventId::new();
    let seat = fixtures::seat(&durable, event);
    manager.acquire_lock(seat, &HolderId::new("alice")).await.unwrap();

    let mut subscription = manager.subscribe(event).await;
    assert!(!manager.acquire_lock(seat, &HolderId::new("bob")).await.unwrap());
    manager.hub().publish_booking_status(event, seatlock_core::BookingId::new(), "pending", manager.now()).await;

    // The booking message is the first thing delivered.
    let message = subscription.recv().await.unwrap();
    assert_eq!(message.kind(), "booking-status-change");
}

#[tokio::test]
async fn reclaimed_lock_is_broadcast_as_available() {
    let (manager, durable, clock) = setup();
    let event = EventId::new();
    let seat = fixtures::seat(&durable, event);
    manager
        .acquire_lock_for(seat, &HolderId::new("alice"), Duration::seconds(5))
        .await
        .unwrap();

    let mut subscription = manager.subscribe(event).await;
    clock.advance(Duration::seconds(6));
    ExpirySweeper::for_manager(manager.clone()).sweep_once().await;

    assert_eq!(
        next_seat_status(&mut subscription).await,
        (SeatStatus::Available, None)
    );
}

#[tokio::test]
async fn other_events_do_not_see_the_change() {
    let (manager, durable, _) = setup();
    let event = EventId::new();
    let seat = fixtures::seat(&durable, event);
    let mut elsewhere = manager.subscribe(EventId::new()).await;

    manager.acquire_lock(seat, &HolderId::new("alice")).await.unwrap();

    let waited = tokio::time::timeout(std::time::Duration::from_millis(50), elsewhere.recv()).await;
    assert!(waited.is_err());
}

#[tokio::test]
async fn background_sweeper_reclaims_without_manual_sweep() {
    let (manager, durable, clock) = setup();
    let event = EventId::new();
    let seat = fixtures::seat(&durable, event);
    manager
        .acquire_lock_for(seat, &HolderId::new("alice"), Duration::seconds(5))
        .await
        .unwrap();
    let mut subscription = manager.subscribe(event).await;
    clock.advance(Duration::seconds(6));

    let sweeper = ExpirySweeper::new(manager.clone(), std::time::Duration::from_millis(10));
    sweeper.start();
    let update = next_seat_status(&mut subscription).await;
    sweeper.stop().await;

    assert_eq!(update, (SeatStatus::Available, None));
    assert_eq!(durable.lock_count(), 0);
}
