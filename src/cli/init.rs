use std::path::Path;

use envault::api::EnvaultClient;
use envault::error::{Result, VaultError};
use envault::vault;

pub async fn run(dir: &Path) -> Result<()> {
    if vault::is_initialized(dir) {
        return Err(VaultError::VaultAlreadyExists(
            vault::vault_path(dir).display().to_string(),
        ));
    }

    let client = EnvaultClient::init(dir).await?;
    client.shutdown().await;

    eprintln!("Vault initialized at {}", dir.display());
    eprintln!(
        "Identity written to {} — back it up; without it the vault cannot be decrypted.",
        vault::identity_path(dir).display()
    );
    Ok(())
}
