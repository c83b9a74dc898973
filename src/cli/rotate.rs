use std::path::Path;

use crate::cli::common;
use crate::cli::json_output::{DueResponse, RotateResponse};
use chrono::Utc;
use envault::error::{Result, VaultError};
use envault::rotation::job::JobState;

pub async fn run(dir: &Path, project: &str, key: &str, json: bool) -> Result<()> {
    let client = common::open_client(dir).await?;
    let result = client.rotate(project, key).await;
    client.shutdown().await;
    let job = result?;

    if json {
        common::print_json(&RotateResponse {
            job_id: job.id.to_string(),
            project: job.project.clone(),
            key: job.key.clone(),
            state: job.state,
            trigger: job.trigger,
            attempt: job.attempt,
            new_version: job.new_version,
            error: job.error.clone(),
        })?;
    }

    match job.state {
        JobState::Committed => {
            if !json {
                eprintln!(
                    "Secret '{}/{}' rotated to v{} (job {}).",
                    project,
                    key,
                    job.new_version.unwrap_or_default(),
                    job.id
                );
            }
            Ok(())
        }
        _ => {
            let detail = job.error.unwrap_or_else(|| "unknown failure".to_string());
            Err(VaultError::Other(format!(
                "rotation of '{}/{}' failed: {}",
                project, key, detail
            )))
        }
    }
}

pub async fn due(dir: &Path, within: Option<&str>, json: bool) -> Result<()> {
    let before = match within {
        Some(s) => Utc::now() + chrono::Duration::seconds(common::parse_interval(s)? as i64),
        None => Utc::now(),
    };

    let client = common::open_client(dir).await?;
    let result = client.list_due(before).await;
    client.shutdown().await;
    let due = result?;

    if json {
        common::print_json(&DueResponse { due })?;
    } else if due.is_empty() {
        eprintln!("No secrets due for rotation.");
    } else {
        for target in &due {
            println!(
                "{}/{}\tdue {}",
                target.project,
                target.key,
                target.next_rotation_at.to_rfc3339()
            );
        }
    }
    Ok(())
}
