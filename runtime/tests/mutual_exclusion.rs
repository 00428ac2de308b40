//! Property tests: at most one holder has an unexpired lock on a seat.
//!
//! Random sequences of acquire / release / clock advance / sweep / check are
//! replayed against a `LockManager` and a reference model of who should hold
//! each seat.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;
use seatlock_core::environment::Clock;
use seatlock_core::{EventId, HolderId, LockError, SeatId};
use seatlock_runtime::{BroadcastHub, ExpirySweeper, LockManager};
use seatlock_testing::{InMemoryLockStore, ManualClock, fixtures};
use std::collections::HashMap;
use std::sync::Arc;

const SEATS: usize = 3;
const HOLDERS: usize = 3;

#[derive(Debug, Clone)]
enum Op {
    Acquire { seat: usize, holder: usize, ttl: i64 },
    Release { seat: usize, holder: usize },
    Advance { secs: i64 },
    Sweep,
    Check { seat: usize },
    DropCache,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..SEATS, 0..HOLDERS, 1i64..30).prop_map(|(seat, holder, ttl)| Op::Acquire { seat, holder, ttl }),
        2 => (0..SEATS, 0..HOLDERS).prop_map(|(seat, holder)| Op::Release { seat, holder }),
        2 => (1i64..20).prop_map(|secs| Op::Advance { secs }),
        1 => Just(Op::Sweep),
        2 => (0..SEATS).prop_map(|seat| Op::Check { seat }),
        1 => Just(Op::DropCache),
    ]
}

/// Expected lock per seat: holder and expiry.
#[derive(Default)]
struct Model {
    locks: HashMap<usize, (usize, DateTime<Utc>)>,
}

impl Model {
    fn active(&self, seat: usize, now: DateTime<Utc>) -> Option<usize> {
        self.locks
            .get(&seat)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(holder, _)| *holder)
    }
}

fn holder(index: usize) -> HolderId {
    HolderId::new(format!("holder-{index}"))
}

async fn run(ops: Vec<Op>) {
    let durable = InMemoryLockStore::new();
    let clock = ManualClock::default();
    let manager = LockManager::new(
        durable.clone(),
        Arc::new(BroadcastHub::default()),
        Arc::new(clock.clone()),
    );
    let sweeper = ExpirySweeper::for_manager(manager.clone());
    let seats: Vec<SeatId> = fixtures::seats(&durable, EventId::new(), SEATS);
    let mut model = Model::default();

    for op in ops {
        let now = clock.now();
        match op {
            Op::Acquire { seat, holder: h, ttl } => {
                let got = manager
                    .acquire_lock_for(seats[seat], &holder(h), Duration::seconds(ttl))
                    .await
                    .unwrap();
                match model.active(seat, now) {
                    Some(owner) if owner != h => assert!(!got, "{h} stole seat {seat} from {owner}"),
                    Some(_) => {
                        assert!(got);
                        let entry = model.locks.get_mut(&seat).unwrap();
                        entry.1 = entry.1.max(now + Duration::seconds(ttl));
                    }
                    None => {
                        assert!(got);
                        model.locks.insert(seat, (h, now + Duration::seconds(ttl)));
                    }
                }
            }
            Op::Release { seat, holder: h } => {
                let result = manager.release_lock(seats[seat], &holder(h)).await;
                match model.locks.get(&seat).copied() {
                    Some((owner, expires_at)) if owner != h && expires_at > now => {
                        assert!(matches!(result, Err(LockError::Forbidden { .. })));
                    }
                    Some((owner, _)) if owner == h => {
                        assert_eq!(result, Ok(true));
                        model.locks.remove(&seat);
                    }
                    _ => assert_eq!(result, Ok(true)),
                }
            }
            Op::Advance { secs } => clock.advance(Duration::seconds(secs)),
            Op::Sweep => {
                sweeper.sweep_once().await;
                model.locks.retain(|_, (_, expires_at)| *expires_at > now);
            }
            Op::Check { seat } => {
                let found = manager.check_lock(seats[seat]).await.unwrap();
                assert_eq!(
                    found.map(|lock| lock.holder_id),
                    model.active(seat, now).map(holder)
                );
                if model.active(seat, now).is_none() {
                    model.locks.remove(&seat);
                }
            }
            Op::DropCache => manager.store().cache().clear(),
        }

        // Invariant: the durable tier agrees with the model on every active lock.
        for (index, seat) in seats.iter().enumerate() {
            let snapshot = durable.snapshot(seat).unwrap();
            let active = snapshot.active_lock(now).map(|lock| lock.holder_id.clone());
            assert_eq!(active, model.active(index, now).map(holder));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn at_most_one_active_holder_per_seat(ops in prop::collection::vec(op(), 1..60)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(run(ops));
    }
}

#[tokio::test]
async fn concurrent_acquires_grant_exactly_one_holder() {
    let durable = InMemoryLockStore::new();
    let manager = LockManager::new(
        durable.clone(),
        Arc::new(BroadcastHub::default()),
        Arc::new(ManualClock::default()),
    );
    let seat = fixtures::seat(&durable, EventId::new());

    let attempts = (0..32).map(|i| {
        let manager = manager.clone();
        tokio::spawn(async move { manager.acquire_lock(seat, &holder(i)).await.unwrap() })
    });
    let results = futures::future::join_all(attempts).await;

    let winners = results.into_iter().filter(|r| *r.as_ref().unwrap()).count();
    assert_eq!(winners, 1);
    assert_eq!(durable.lock_count(), 1);
}
