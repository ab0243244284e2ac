//! # CrmSync Domain
//!
//! Business types for the CRM sync engine.
//!
//! This crate contains:
//! - Sync jobs, schedules and their lifecycle state machine
//! - Quota, rate-limit and usage types
//! - The error taxonomy and persisted error records
//! - Configuration structures and default constants
//!
//! ## Architecture
//! - No dependencies on other CrmSync crates
//! - Pure data and invariants, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

pub use config::*;
pub use errors::*;
pub use types::*;
