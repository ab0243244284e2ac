//! # CrmSync App
//!
//! Application layer - command facade and process entry point.
//!
//! This crate contains:
//! - Commands (the public surface over the job manager, limiter and error handler)
//! - Application context (dependency injection)
//! - Logging setup and health reporting
//!
//! ## Architecture
//! - Depends on `common`, `domain`, `core`, and `infra`
//! - Wires SQLite repositories and background schedulers into the core services

pub mod commands;
pub mod context;
pub mod utils;

// Re-export for convenience
pub use commands::*;
pub use context::*;
