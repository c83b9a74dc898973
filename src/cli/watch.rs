use std::path::Path;

use crate::cli::common;
use envault::error::{Result, VaultError};

/// Run the rotation scheduler in the foreground until Ctrl-C.
pub async fn run(dir: &Path) -> Result<()> {
    let client = common::open_client(dir).await?;
    let scheduler = client.start_scheduler();
    eprintln!(
        "Scheduler running (tick every {}s). Press Ctrl-C to stop.",
        client.config().rotation.tick_secs
    );

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| VaultError::Other(format!("failed to listen for Ctrl-C: {}", e)))?;

    eprintln!("Stopping scheduler...");
    scheduler.stop().await;
    if client.audit_failures() > 0 {
        eprintln!(
            "Warning: {} audit append(s) failed during this run.",
            client.audit_failures()
        );
    }
    client.shutdown().await;
    Ok(())
}
