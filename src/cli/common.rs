use std::io::{self, Read};
use std::path::{Path, PathBuf};

use envault::api::EnvaultClient;
use envault::error::{Result, VaultError};

/// Resolve the vault directory: `--dir` / `ENVAULT_DIR`, else `~/.envault`.
pub fn effective_dir(dir: Option<&Path>) -> PathBuf {
    dir.map(Path::to_path_buf)
        .unwrap_or_else(envault::vault::envault_dir)
}

/// Actor label for audit entries written by this process.
pub fn actor() -> String {
    match std::env::var("USER") {
        Ok(user) if !user.is_empty() => format!("cli({})", user),
        _ => "cli".to_string(),
    }
}

pub async fn open_client(dir: &Path) -> Result<EnvaultClient> {
    Ok(EnvaultClient::open(dir).await?.with_actor(actor()))
}

/// Read a secret value from stdin, trimming the trailing newline that
/// piping through echo leaves behind.
pub fn read_stdin_value() -> Result<String> {
    let mut value = String::new();
    io::stdin()
        .read_to_string(&mut value)
        .map_err(|e| VaultError::Other(format!("Failed to read from stdin: {}", e)))?;
    Ok(value.trim_end_matches('\n').to_string())
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string(value).map_err(|e| VaultError::Serialization(e.to_string()))?
    );
    Ok(())
}

/// Parse a humantime duration ("30d", "12h 30m") into whole seconds.
pub fn parse_interval(s: &str) -> Result<u64> {
    humantime::parse_duration(s)
        .map(|d| d.as_secs())
        .map_err(|e| VaultError::Validation(format!("invalid duration '{}': {}", s, e)))
}
