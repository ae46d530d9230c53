//! HTTP service for the dmda snapshot cache.
//!
//! This crate contains:
//! - Command-line and environment configuration
//! - The axum router, handlers, and graceful shutdown
//! - Service-level errors mapped to exit codes

pub mod cli;
pub mod error;
pub mod server;

pub use error::ApiError;
