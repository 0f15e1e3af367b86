//! `meshwork serve`: a primary worker behind stdin/stdout.

use anyhow::{Result, anyhow};
use mcore::MeshworkConfig;
use worker::bridge;

/// Bridge stdio to a primary worker until stdin closes.
pub async fn run(config: &MeshworkConfig) -> Result<()> {
    let (link, thread) = worker::launch_primary(config)?;
    tracing::info!(
        "serving on stdio with {} minions",
        config.worker.minions
    );

    bridge::serve(tokio::io::stdin(), tokio::io::stdout(), link).await?;
    tokio::task::spawn_blocking(move || thread.join())
        .await?
        .map_err(|_| anyhow!("worker thread panicked"))?;
    tracing::info!("worker stopped");
    Ok(())
}
