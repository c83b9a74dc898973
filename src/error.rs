use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Vault not initialized. Run `envault init` first.")]
    VaultNotInitialized,

    #[error("Vault already initialized at {0}")]
    VaultAlreadyExists(String),

    #[error("Secret not found: {project}/{key}")]
    NotFound { project: String, key: String },

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Version conflict on {project}/{key}: expected {expected}, found {actual}")]
    Conflict {
        project: String,
        key: String,
        expected: u32,
        actual: u32,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Encryption gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Invalid ciphertext: {0}")]
    InvalidCiphertext(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Generation failure: {0}")]
    GenerationFailure(String),

    #[error("Verification failure: {0}")]
    VerificationFailure(String),

    #[error("Rotation target missing: {project}/{key}")]
    TargetMissing { project: String, key: String },

    #[error("Rotation job not found: {0}")]
    JobNotFound(String),

    #[error("Audit chain integrity violation at entry {0}")]
    AuditChainBroken(usize),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl VaultError {
    /// Return a typed exit code for this error category.
    pub fn exit_code(&self) -> i32 {
        match self {
            VaultError::VaultNotInitialized => 7,
            VaultError::VaultAlreadyExists(_) => 5,
            VaultError::NotFound { .. } => 3,
            VaultError::ProjectNotFound(_) => 3,
            VaultError::Conflict { .. } => 6,
            VaultError::Validation(_) => 2,
            VaultError::GatewayUnavailable(_) => 4,
            VaultError::InvalidCiphertext(_) => 4,
            VaultError::StoreUnavailable(_) => 4,
            VaultError::GenerationFailure(_) => 8,
            VaultError::VerificationFailure(_) => 8,
            VaultError::TargetMissing { .. } => 3,
            VaultError::JobNotFound(_) => 3,
            VaultError::AuditChainBroken(_) => 1,
            VaultError::Serialization(_) => 1,
            VaultError::Io(_) => 1,
            VaultError::Other(_) => 1,
        }
    }

    /// Return a string error code identifier.
    pub fn error_code(&self) -> &'static str {
        match self {
            VaultError::VaultNotInitialized => "vault_not_initialized",
            VaultError::VaultAlreadyExists(_) => "already_exists",
            VaultError::NotFound { .. } => "not_found",
            VaultError::ProjectNotFound(_) => "not_found",
            VaultError::Conflict { .. } => "conflict",
            VaultError::Validation(_) => "validation_error",
            VaultError::GatewayUnavailable(_) => "gateway_unavailable",
            VaultError::InvalidCiphertext(_) => "invalid_ciphertext",
            VaultError::StoreUnavailable(_) => "store_unavailable",
            VaultError::GenerationFailure(_) => "generation_failure",
            VaultError::VerificationFailure(_) => "verification_failure",
            VaultError::TargetMissing { .. } => "target_missing",
            VaultError::JobNotFound(_) => "not_found",
            VaultError::AuditChainBroken(_) => "audit_chain_broken",
            VaultError::Serialization(_) => "serialization_error",
            VaultError::Io(_) => "io_error",
            VaultError::Other(_) => "error",
        }
    }

    /// Whether retrying the operation could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            VaultError::StoreUnavailable(_) | VaultError::GatewayUnavailable(_)
        )
    }
}

/// JSON error response for --json mode.
#[derive(Serialize)]
pub struct JsonError {
    pub error: JsonErrorDetail,
}

#[derive(Serialize)]
pub struct JsonErrorDetail {
    pub code: String,
    pub message: String,
    pub exit_code: i32,
}

impl JsonError {
    pub fn from_error(e: &VaultError) -> Self {
        Self {
            error: JsonErrorDetail {
                code: e.error_code().to_string(),
                message: e.to_string(),
                exit_code: e.exit_code(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, VaultError>;
