//! Configuration loader
//!
//! ## Loading Strategy
//! 1. Environment variables, when `CRMSYNC_DB_PATH` is set
//! 2. Otherwise the first config file found by [`probe_config_paths`]
//! 3. Otherwise built-in defaults
//!
//! The result is validated before it is returned.
//!
//! ## Environment Variables
//! - `CRMSYNC_DB_PATH`: database file path (required for the env source)
//! - `CRMSYNC_DB_POOL_SIZE`: connection pool size
//! - `CRMSYNC_MAX_CONCURRENT_JOBS`: concurrent job executions
//! - `CRMSYNC_TICK_INTERVAL`: dispatch tick in seconds
//! - `CRMSYNC_LOG_LEVEL`: tracing filter directive
//! - `CRMSYNC_LOG_JSON`: JSON log output (true/false)
//!
//! Sections without a variable keep their defaults.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use crmsync_domain::{Config, CrmSyncError, Result};

const CONFIG_FILE_NAMES: [&str; 4] = ["crmsync.toml", "crmsync.json", "config.toml", "config.json"];

/// Load configuration with the env → file → defaults fallback.
///
/// # Errors
/// Returns `CrmSyncError::Config` when a source is present but invalid, or
/// when the resulting configuration fails validation.
pub fn load() -> Result<Config> {
    let config = if std::env::var_os("CRMSYNC_DB_PATH").is_some() {
        let config = load_from_env()?;
        tracing::info!("configuration loaded from environment variables");
        config
    } else if let Some(path) = probe_config_paths() {
        load_from_file(Some(path))?
    } else {
        tracing::info!("no configuration source found, using defaults");
        Config::default()
    };

    config.validate()?;
    Ok(config)
}

/// Load configuration from `CRMSYNC_*` environment variables over defaults.
///
/// # Errors
/// Returns `CrmSyncError::Config` if `CRMSYNC_DB_PATH` is missing or a
/// numeric variable does not parse.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();

    config.database.path = env_var("CRMSYNC_DB_PATH")?;
    if let Some(pool_size) = env_parse::<u32>("CRMSYNC_DB_POOL_SIZE")? {
        config.database.pool_size = pool_size;
    }
    if let Some(max_jobs) = env_parse::<usize>("CRMSYNC_MAX_CONCURRENT_JOBS")? {
        config.scheduler.max_concurrent_jobs = max_jobs;
    }
    if let Some(tick) = env_parse::<u64>("CRMSYNC_TICK_INTERVAL")? {
        config.scheduler.tick_interval_secs = tick;
    }
    if let Ok(level) = std::env::var("CRMSYNC_LOG_LEVEL") {
        config.logging.level = level;
    }
    config.logging.json = env_bool("CRMSYNC_LOG_JSON", config.logging.json);

    Ok(config)
}

/// Load configuration from a file.
///
/// If `path` is `None`, probes the standard locations. Format is chosen by
/// extension (`.toml` or `.json`).
///
/// # Errors
/// Returns `CrmSyncError::Config` if no file is found, it cannot be read, or
/// it does not parse.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CrmSyncError::Config(format!(
                    "config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            CrmSyncError::Config("no config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| CrmSyncError::Config(format!("failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CrmSyncError::Config(format!("invalid TOML config: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| CrmSyncError::Config(format!("invalid JSON config: {e}"))),
        _ => Err(CrmSyncError::Config(format!("unsupported config format: {extension}"))),
    }
}

/// First existing config file in the working directory, its parent, or next
/// to the executable.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.join("config"));
        dirs.push(cwd.clone());
        dirs.push(cwd.join(".."));
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        dirs.push(exe_dir);
    }

    probe_in(&dirs)
}

fn probe_in(dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.is_file())
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| CrmSyncError::Config(format!("missing required environment variable: {key}")))
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| CrmSyncError::Config(format!("invalid {key} ({raw:?}): {e}"))),
        Err(_) => Ok(None),
    }
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive).
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
