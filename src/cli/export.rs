use std::fs;
use std::path::Path;

use secrecy::ExposeSecret;
use serde::Serialize;

use crate::cli::common;
use envault::error::{Result, VaultError};
use envault::vault::store::ListFilter;

#[derive(Serialize)]
struct ExportJsonEntry {
    key: String,
    value: String,
    version: u32,
    tags: Vec<String>,
    created: String,
    modified: String,
}

pub async fn run(
    dir: &Path,
    project: Option<&str>,
    format: &str,
    backup: Option<&Path>,
    json: bool,
) -> Result<()> {
    let client = common::open_client(dir).await?;
    let result = export(&client, project, format, backup, json).await;
    client.shutdown().await;
    result
}

async fn export(
    client: &envault::api::EnvaultClient,
    project: Option<&str>,
    format: &str,
    backup: Option<&Path>,
    json: bool,
) -> Result<()> {
    if let Some(path) = backup {
        let sealed = client.backup().await?;
        fs::write(path, &sealed)?;
        if !json {
            eprintln!("Backup written to {} ({} bytes).", path.display(), sealed.len());
        }
        return Ok(());
    }

    let project = project.ok_or_else(|| {
        VaultError::Validation("a project is required unless --backup is used".to_string())
    })?;
    let summaries = client.list(project, ListFilter::default()).await?;

    match format {
        "env" => {
            for summary in &summaries {
                let value = client.get_value(project, &summary.key).await?;
                println!("{}={}", summary.key, dotenv_quote(value.expose_secret()));
            }
        }
        "json" => {
            let mut entries = Vec::with_capacity(summaries.len());
            for summary in &summaries {
                let value = client.get_value(project, &summary.key).await?;
                entries.push(ExportJsonEntry {
                    key: summary.key.clone(),
                    value: value.expose_secret().clone(),
                    version: summary.version,
                    tags: summary.tags.clone(),
                    created: summary.created_at.to_rfc3339(),
                    modified: summary.modified_at.to_rfc3339(),
                });
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&entries)
                    .map_err(|e| VaultError::Serialization(e.to_string()))?
            );
        }
        other => {
            return Err(VaultError::Validation(format!(
                "Unknown format '{}'. Use 'env' or 'json'.",
                other
            )));
        }
    }
    Ok(())
}

/// Quote a value for dotenv format.
fn dotenv_quote(value: &str) -> String {
    if value.is_empty() {
        return "\"\"".to_string();
    }

    let needs_quoting = value.contains(|c: char| {
        c == ' '
            || c == '#'
            || c == '"'
            || c == '\''
            || c == '\\'
            || c == '\n'
            || c == '\r'
            || c == '\t'
            || c == '$'
            || c == '`'
    });

    if needs_quoting {
        let escaped = value
            .replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t");
        format!("\"{}\"", escaped)
    } else {
        value.to_string()
    }
}
