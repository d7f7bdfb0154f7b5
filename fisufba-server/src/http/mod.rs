//! HTTP server layer
//!
//! Axum server with:
//! - CORS (localhost only by default)
//! - Request tracing
//! - Graceful shutdown with a drain deadline
//! - JSON error responses
//! - Session authentication resolved inside each request's transaction

pub mod server;
pub mod error;
pub mod extractors;
pub mod auth;
pub mod routes;

pub use server::{router, run_server, serve, shutdown_signal, AppState, ServerError};
pub use error::ApiError;
pub use auth::Principal;
