use serde::Serialize;

use envault::rotation::job::{JobState, JobTrigger};
use envault::vault::entry::RotationPolicy;
use envault::vault::store::{RotationTarget, SecretSummary};

/// JSON response for `envault get --json`.
#[derive(Serialize)]
pub struct GetResponse {
    pub project: String,
    pub key: String,
    pub value: String,
    pub version: u32,
    pub tags: Vec<String>,
    pub rotation: RotationPolicy,
    pub created: String,
    pub modified: String,
}

/// JSON response for `envault put --json`.
#[derive(Serialize)]
pub struct PutResponse {
    pub project: String,
    pub key: String,
    pub version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<u32>,
}

/// JSON response for `envault list --json`.
#[derive(Serialize)]
pub struct ListResponse {
    pub project: String,
    pub secrets: Vec<SecretSummary>,
}

/// JSON response for `envault remove --json`.
#[derive(Serialize)]
pub struct RemoveResponse {
    pub project: String,
    pub key: String,
    pub removed_version: u32,
}

/// JSON response for `envault import --json`.
#[derive(Serialize)]
pub struct ImportResponse {
    pub project: String,
    pub imported: usize,
    pub skipped: usize,
    pub malformed: usize,
    pub errors: Vec<envault::import::ImportFailure>,
}

/// JSON response for `envault rotate --json`.
#[derive(Serialize)]
pub struct RotateResponse {
    pub job_id: String,
    pub project: String,
    pub key: String,
    pub state: JobState,
    pub trigger: JobTrigger,
    pub attempt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// JSON response for `envault due --json`.
#[derive(Serialize)]
pub struct DueResponse {
    pub due: Vec<RotationTarget>,
}

/// JSON response for `envault audit verify --json`.
#[derive(Serialize)]
pub struct AuditVerifyResponse {
    pub entries: usize,
    pub valid: bool,
}
