use std::path::Path;

use crate::cli::common;
use crate::cli::json_output::AuditVerifyResponse;
use crate::cli::AuditCommands;
use envault::error::Result;

pub async fn run(dir: &Path, cmd: &AuditCommands, json: bool) -> Result<()> {
    match cmd {
        AuditCommands::Show { count } => show(dir, *count, json),
        AuditCommands::Verify => verify(dir, json).await,
    }
}

fn show(dir: &Path, count: usize, json: bool) -> Result<()> {
    let entries = envault::audit::read_entries(&envault::vault::audit_path(dir))?;

    let display = if count == 0 {
        &entries[..]
    } else {
        let start = entries.len().saturating_sub(count);
        &entries[start..]
    };

    if json {
        common::print_json(&display)?;
        return Ok(());
    }

    if entries.is_empty() {
        eprintln!("No audit log entries.");
        return Ok(());
    }

    for record in display {
        let target = match &record.key {
            Some(key) => format!("{}/{}", record.project, key),
            None => record.project.clone(),
        };
        let versions = match (record.before_version, record.after_version) {
            (Some(b), Some(a)) => format!("v{}->v{}", b, a),
            (None, Some(a)) => format!("->v{}", a),
            (Some(b), None) => format!("v{}->", b),
            (None, None) => String::new(),
        };
        println!(
            "{} | {:<8} | {:<7} | {:<20} | {} {} {}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            format!("{:?}", record.action).to_lowercase(),
            format!("{:?}", record.outcome).to_lowercase(),
            record.actor,
            target,
            versions,
            record.detail.as_deref().unwrap_or(""),
        );
    }

    eprintln!("\n({} entries shown of {} total)", display.len(), entries.len());
    Ok(())
}

async fn verify(dir: &Path, json: bool) -> Result<()> {
    let client = common::open_client(dir).await?;
    let result = client.verify_audit_chain();
    client.shutdown().await;

    match result {
        Ok(count) => {
            if json {
                common::print_json(&AuditVerifyResponse {
                    entries: count,
                    valid: true,
                })?;
            } else {
                println!(
                    "Audit log integrity verified. {} entries, chain intact.",
                    count
                );
            }
            Ok(())
        }
        Err(e) => {
            if !json {
                eprintln!("INTEGRITY FAILURE: {}", e);
            }
            Err(e)
        }
    }
}
