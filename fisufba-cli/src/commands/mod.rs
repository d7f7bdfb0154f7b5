//! Command implementations for the fisufba CLI

pub mod provision;
pub mod serve;

pub use provision::run_provision;
pub use serve::run_serve;
