//! Database layer - persistence gateway and repositories
//!
//! # Design Principles
//!
//! - One explicitly owned pool ([`Gateway`]); no global connection
//! - Every request runs in exactly one transaction (`Gateway::transact`)
//! - Rely on DB constraints, handle conflicts - no check-then-insert
//! - Read-modify-write paths lock the row first (`SELECT ... FOR UPDATE`)

pub mod error;
pub mod pool;
pub mod repos;

pub use error::{ConstraintKind, StorageError};
pub use pool::{connect_options, Gateway, GatewayOptions, ScopedConnection};
pub use repos::*;
