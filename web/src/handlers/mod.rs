//! HTTP and WebSocket request handlers.

pub mod availability;
pub mod bookings;
pub mod health;
pub mod locks;
pub mod ws;

pub use health::health_check;
