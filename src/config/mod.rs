use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::Result;

/// Configuration file format (`<dir>/envault.toml`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub rotation: RotationConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    /// Ordered classification rules, first match wins.
    #[serde(default)]
    pub classify: Vec<ClassifyRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Persistence attempts before an operation reports StoreUnavailable.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Initial backoff between attempts, doubled each retry.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Upper bound on a single disk write.
    #[serde(default = "default_io_timeout_secs")]
    pub io_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            io_timeout_secs: default_io_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Path to the age identity file (defaults to `<dir>/identity.age`).
    pub identity: Option<String>,
    /// Upper bound on a single encrypt/decrypt call.
    #[serde(default = "default_gateway_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            identity: None,
            timeout_secs: default_gateway_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationConfig {
    /// Scheduler scan interval in seconds.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Upper bound on one generator or verifier invocation.
    #[serde(default = "default_hook_timeout_secs")]
    pub hook_timeout_secs: u64,
    /// Terminal jobs kept for status queries before pruning oldest-first.
    #[serde(default = "default_retain_jobs")]
    pub retain_jobs: usize,
    /// Length of values produced by the default generator.
    #[serde(default = "default_generator_length")]
    pub generator_length: usize,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            hook_timeout_secs: default_hook_timeout_secs(),
            retain_jobs: default_retain_jobs(),
            generator_length: default_generator_length(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Maps key-name glob patterns to a classification label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyRule {
    pub pattern: String,
    pub classification: String,
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    200
}

fn default_io_timeout_secs() -> u64 {
    5
}

fn default_gateway_timeout_secs() -> u64 {
    5
}

fn default_tick_secs() -> u64 {
    30
}

fn default_hook_timeout_secs() -> u64 {
    10
}

fn default_retain_jobs() -> usize {
    256
}

fn default_generator_length() -> usize {
    32
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load config from a path. Returns default config if file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::error::VaultError::Other(format!("Invalid config: {}", e)))?;
        Ok(config)
    }

    /// Save config to a path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::VaultError::Other(format!("Config serialize error: {}", e)))?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, content)?;
        Ok(())
    }
}
