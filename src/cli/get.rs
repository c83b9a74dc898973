use std::path::Path;

use secrecy::ExposeSecret;

use crate::cli::common;
use crate::cli::json_output::GetResponse;
use envault::error::Result;

pub async fn run(
    dir: &Path,
    project: &str,
    key: &str,
    version: Option<u32>,
    json: bool,
) -> Result<()> {
    let client = common::open_client(dir).await?;

    let result = async {
        let entry = client.get(project, key).await?;
        let value = match version {
            Some(n) => client.get_version(project, key, n).await?,
            None => client.get_value(project, key).await?,
        };
        Ok::<_, envault::error::VaultError>((entry, value))
    }
    .await;
    client.shutdown().await;
    let (entry, value) = result?;

    if json {
        common::print_json(&GetResponse {
            project: project.to_string(),
            key: key.to_string(),
            value: value.expose_secret().clone(),
            version: version.unwrap_or_else(|| entry.version()),
            tags: entry.tags.iter().cloned().collect(),
            rotation: entry.rotation.clone(),
            created: entry.created_at.to_rfc3339(),
            modified: entry.modified_at.to_rfc3339(),
        })?;
    } else {
        print!("{}", value.expose_secret());
    }
    Ok(())
}
