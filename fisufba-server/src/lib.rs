//! fisufba-server: HTTP API for the FisUFBA clinic records
//!
//! Accounts, sessions and patient forms served over JSON, backed by a
//! PostgreSQL schema this crate also knows how to provision.
//!
//! - [`config`]: `AppConfig`, built once at startup
//! - [`db`]: the persistence gateway (`Gateway`) and repositories
//! - [`provision`]: idempotent schema creation and seeding
//! - [`models`]: validated domain values
//! - [`http`]: axum router, handlers, auth and error mapping

pub mod config;
pub mod db;
pub mod http;
pub mod models;
pub mod provision;

pub use config::{AppConfig, ConfigError, DatabaseConfig, ServerConfig};
pub use db::{Gateway, StorageError};
pub use http::{run_server, serve, ApiError, ServerError};
pub use provision::{provision, ProvisionError, ProvisionReport};
