//! WebSocket subscription to an event's status channel.
//!
//! # Architecture
//!
//! ```text
//! Client          ws handler              BroadcastHub
//!   │                 │                        │
//!   ├─ Upgrade ──────>│                        │
//!   │                 ├─ subscribe(event) ────>│
//!   │                 │                        │
//!   │                 │<── StatusMessage ──────┤
//!   │<─ JSON text ────┤                        │
//!   │<─ Ping ─────────┤  (every 30s)           │
//! ```
//!
//! The stream is one-way: text frames from the client are ignored apart from
//! resetting the idle timer. Messages missed while lagging or disconnected are
//! never replayed; clients reconcile with the bulk availability endpoint.

use crate::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{stream::StreamExt, SinkExt};
use seatlock_core::store::LockStore;
use seatlock_core::EventId;
use seatlock_runtime::Subscription;
use std::sync::Arc;
use tokio::sync::OwnedSemaphorePermit;
use tokio::time::{interval_at, sleep, Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Keep-alive ping interval.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Close the connection after this long without client traffic (pongs count).
const IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Upgrade to a WebSocket streaming `StatusMessage`s for one event.
///
/// ```text
/// GET /api/events/:event_id/subscribe
/// ```
///
/// Responds 503 when the connection cap is reached. The subscription is taken
/// before the upgrade so nothing published after the 101 response is missed.
pub async fn subscribe<S: LockStore + 'static>(
    ws: WebSocketUpgrade,
    Path(event_id): Path<Uuid>,
    State(state): State<AppState<S>>,
) -> Response {
    let Ok(permit) = Arc::clone(&state.ws_slots).try_acquire_owned() else {
        warn!(%event_id, "WebSocket connection limit exceeded");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "Too many concurrent connections. Please try again later.",
        )
            .into_response();
    };

    let subscription = state.manager.subscribe(EventId::from_uuid(event_id)).await;
    info!(%event_id, "WebSocket subscription requested");

    ws.on_upgrade(move |socket| forward(socket, subscription, permit))
}

/// Pump hub messages to the client until either side goes away.
///
/// The permit is held for the lifetime of the connection.
async fn forward(socket: WebSocket, mut subscription: Subscription, _permit: OwnedSemaphorePermit) {
    let event_id = subscription.event_id();
    let (mut sender, mut receiver) = socket.split();
    let mut ping = interval_at(Instant::now() + PING_INTERVAL, PING_INTERVAL);
    let idle = sleep(IDLE_TIMEOUT);
    tokio::pin!(idle);

    info!(%event_id, "WebSocket connection established");

    loop {
        tokio::select! {
            message = subscription.recv() => {
                let Some(message) = message else {
                    debug!(%event_id, "Hub closed");
                    break;
                };
                let json = match serde_json::to_string(&message) {
                    Ok(json) => json,
                    Err(e) => {
                        error!(%event_id, error = %e, "Failed to serialize status message");
                        continue;
                    }
                };
                if sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
            _ = ping.tick() => {
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_)) | Err(_)) | None => {
                    debug!(%event_id, "Client closed");
                    break;
                }
                Some(Ok(_)) => idle.as_mut().reset(Instant::now() + IDLE_TIMEOUT),
            },
            () = &mut idle => {
                warn!(%event_id, "WebSocket idle timeout");
                break;
            }
        }
    }

    // Best effort; the peer may already be gone.
    let _ = sender.send(Message::Close(None)).await;
    info!(%event_id, "WebSocket connection closed");
}
