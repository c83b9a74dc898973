use std::path::Path;

use secrecy::SecretString;

use crate::cli::common;
use crate::cli::json_output::PutResponse;
use envault::error::Result;
use envault::vault::entry::RotationPolicy;
use envault::vault::store::PutRequest;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    dir: &Path,
    project: &str,
    key: &str,
    tags: &[String],
    every: Option<&str>,
    event_triggered: bool,
    expected_version: Option<u32>,
    json: bool,
) -> Result<()> {
    // Parse the policy before touching stdin so bad flags fail fast.
    let rotation = if let Some(every) = every {
        Some(RotationPolicy::Interval {
            every_secs: common::parse_interval(every)?,
        })
    } else if event_triggered {
        Some(RotationPolicy::EventTriggered)
    } else {
        None
    };

    let value = common::read_stdin_value()?;
    let client = common::open_client(dir).await?;

    let mut request = PutRequest::new(project, key, SecretString::new(value));
    if !tags.is_empty() {
        request.tags = Some(tags.iter().cloned().collect());
    }
    request.rotation = rotation;
    request.expected_version = expected_version;

    let outcome = client.put_with(request).await;
    client.shutdown().await;
    let outcome = outcome?;

    if json {
        common::print_json(&PutResponse {
            project: project.to_string(),
            key: key.to_string(),
            version: outcome.version,
            previous: outcome.previous,
        })?;
    } else {
        match outcome.previous {
            Some(previous) => eprintln!(
                "Secret '{}/{}' updated: v{} -> v{}.",
                project, key, previous, outcome.version
            ),
            None => eprintln!("Secret '{}/{}' stored at v1.", project, key),
        }
    }
    Ok(())
}
