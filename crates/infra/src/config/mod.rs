//! Configuration loading
//!
//! Environment variables, TOML/JSON files and built-in defaults, in that
//! order of preference.

pub mod loader;

pub use loader::{load, load_from_env, load_from_file, probe_config_paths};
