//! Router configuration.

use crate::handlers::{availability, bookings, health, locks, ws};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use seatlock_core::store::LockStore;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// Every response carries an `x-request-id` header, generated when the
/// request did not bring one, and each request is traced.
pub fn build_router<S: LockStore + 'static>(state: AppState<S>) -> Router {
    let api_routes = Router::new()
        .route(
            "/seats/:seat_id/lock",
            post(locks::acquire_lock::<S>)
                .delete(locks::release_lock::<S>)
                .get(locks::check_lock::<S>),
        )
        .route("/seats/availability", post(availability::bulk_check::<S>))
        .route(
            "/events/:event_id/bookings/status",
            post(bookings::publish_booking_status::<S>),
        )
        .route("/events/:event_id/subscribe", get(ws::subscribe::<S>));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics::<S>))
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .with_state(state)
}
