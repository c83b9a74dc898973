use std::fs;
use std::path::Path;

use crate::cli::common;
use envault::error::Result;

pub async fn run(dir: &Path, file: &Path, json: bool) -> Result<()> {
    let sealed = fs::read(file)?;

    let client = common::open_client(dir).await?;
    let result = client.restore_backup(&sealed).await;
    let snapshot = client.snapshot().await;
    client.shutdown().await;
    result?;

    if !json {
        let snapshot = snapshot?;
        eprintln!(
            "Vault restored from {}: {} secret(s) across {} project(s).",
            file.display(),
            snapshot.secret_count(),
            snapshot.projects.len()
        );
    }
    Ok(())
}
