use std::fs;
use std::io::Read;
use std::path::Path;

use crate::cli::common;
use crate::cli::json_output::ImportResponse;
use envault::error::{Result, VaultError};
use envault::import;

pub async fn run(dir: &Path, project: &str, file: &str, overwrite: bool, json: bool) -> Result<()> {
    let content = if file == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| VaultError::Other(format!("Failed to read from stdin: {}", e)))?;
        buf
    } else {
        fs::read_to_string(file)?
    };

    let parsed = import::parse(&content);
    let client = common::open_client(dir).await?;
    let report = client.import_parsed(project, &parsed, overwrite).await;
    client.shutdown().await;

    if json {
        common::print_json(&ImportResponse {
            project: project.to_string(),
            imported: report.imported,
            skipped: report.skipped,
            malformed: parsed.malformed,
            errors: report.errors.clone(),
        })?;
    } else {
        eprintln!(
            "{} secret(s) imported, {} skipped into '{}'.",
            report.imported, report.skipped, project
        );
        if parsed.malformed > 0 {
            eprintln!("{} malformed line(s) ignored.", parsed.malformed);
        }
        for failure in &report.errors {
            eprintln!("failed: {}: {}", failure.key, failure.error);
        }
    }

    if report.errors.is_empty() {
        Ok(())
    } else {
        Err(VaultError::Other(format!(
            "{} key(s) failed to import",
            report.errors.len()
        )))
    }
}
