use std::path::Path;

use crate::cli::common;
use crate::cli::json_output::ListResponse;
use envault::error::Result;
use envault::vault::entry::RotationPolicy;
use envault::vault::store::ListFilter;

pub async fn run(
    dir: &Path,
    project: &str,
    tag: Option<&str>,
    prefix: Option<&str>,
    json: bool,
) -> Result<()> {
    let client = common::open_client(dir).await?;
    let filter = ListFilter {
        tag: tag.map(String::from),
        key_prefix: prefix.map(String::from),
    };
    let result = client.list(project, filter).await;
    client.shutdown().await;
    let secrets = result?;

    if json {
        common::print_json(&ListResponse {
            project: project.to_string(),
            secrets,
        })?;
    } else {
        for summary in &secrets {
            let policy = match &summary.rotation {
                RotationPolicy::Manual => "manual".to_string(),
                RotationPolicy::Interval { every_secs } => {
                    format!("every {}", humantime::format_duration(
                        std::time::Duration::from_secs(*every_secs)
                    ))
                }
                RotationPolicy::EventTriggered => "event-triggered".to_string(),
            };
            println!("{}\tv{}\t{}", summary.key, summary.version, policy);
        }
    }
    Ok(())
}
