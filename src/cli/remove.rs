use std::path::Path;

use crate::cli::common;
use crate::cli::json_output::RemoveResponse;
use envault::error::Result;

pub async fn run(dir: &Path, project: &str, key: &str, json: bool) -> Result<()> {
    let client = common::open_client(dir).await?;
    let result = client.delete(project, key).await;
    client.shutdown().await;
    let removed_version = result?;

    if json {
        common::print_json(&RemoveResponse {
            project: project.to_string(),
            key: key.to_string(),
            removed_version,
        })?;
    } else {
        eprintln!("Secret '{}/{}' removed (was v{}).", project, key, removed_version);
    }
    Ok(())
}
