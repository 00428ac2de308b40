//! Axum transport for the seat lock subsystem.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         HTTP / WebSocket (Axum)         │  ← JSON, status codes
//! │  - Request parsing, TTL bounds          │  ← Request ids, tracing
//! │  - Error mapping (AppError)             │  ← Connection cap
//! ├─────────────────────────────────────────┤
//! │         LockManager (runtime)           │
//! │  - Durable CAS + advisory cache         │
//! │  - Broadcast after commit               │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use seatlock_web::{build_router, AppState, Config};
//!
//! let config = Config::from_env();
//! let app = build_router(AppState::new(manager, config.locks.clone()));
//! let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::AppError;
pub use routes::build_router;
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
