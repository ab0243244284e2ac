//! CrmSync - background CRM synchronization engine
//!
//! Loads configuration, starts the job and maintenance schedulers and runs
//! until interrupted.

use anyhow::Context;
use crmsync_app::utils::logging;
use crmsync_app::AppContext;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before reading any CRMSYNC_* variable
    let dotenv = dotenvy::dotenv();

    let config = crmsync_infra::config::load().context("failed to load configuration")?;
    logging::init(&config.logging).context("failed to initialise logging")?;

    match dotenv {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(err) if err.not_found() => {}
        Err(err) => warn!(error = %err, "could not read .env file"),
    }

    info!(version = env!("CARGO_PKG_VERSION"), "crmsync starting");

    let context = AppContext::new(config).await.context("failed to build application context")?;
    let restored = context.start().await.context("failed to start sync engine")?;
    info!(restored, "crmsync running; press Ctrl+C to stop");

    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
    }

    context.shutdown().await.context("shutdown failed")?;
    Ok(())
}
