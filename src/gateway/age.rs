use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use age::secrecy::ExposeSecret;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hkdf::Hkdf;
use secrecy::SecretString;
use sha2::Sha256;

use crate::error::{Result, VaultError};
use crate::gateway::EncryptionGateway;
use crate::vault::entry::CipherValue;

/// Payload format tag for age x25519 envelopes.
pub const FORMAT_AGE_X25519: u32 = 1;

/// Local encryption gateway backed by an age x25519 identity file.
///
/// Each value gets its own age envelope (age wraps a fresh file key to the
/// recipient per encryption), so revoking or rewrapping one value never
/// touches another.
pub struct AgeGateway {
    identity: age::x25519::Identity,
    recipient: age::x25519::Recipient,
    key_id: String,
}

impl std::fmt::Debug for AgeGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgeGateway")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl AgeGateway {
    /// Generate a fresh identity, write it to `path` (0600 on unix), and
    /// return a gateway over it.
    pub fn generate(path: &Path) -> Result<Self> {
        if path.exists() {
            return Err(VaultError::GatewayUnavailable(format!(
                "identity file already exists: {}",
                path.display()
            )));
        }
        let identity = age::x25519::Identity::generate();
        let secret_key = identity.to_string();

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, secret_key.expose_secret())?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(Self::from_identity(identity))
    }

    /// Load an existing identity file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            VaultError::GatewayUnavailable(format!(
                "cannot read identity file {}: {}",
                path.display(),
                e
            ))
        })?;
        // age-keygen output carries `#` comment lines before the key.
        let secret_line = content
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty() && !l.starts_with('#'))
            .ok_or_else(|| {
                VaultError::GatewayUnavailable(format!(
                    "identity file {} contains no key",
                    path.display()
                ))
            })?;
        let identity: age::x25519::Identity = secret_line
            .parse()
            .map_err(|e: &str| VaultError::GatewayUnavailable(e.to_string()))?;
        Ok(Self::from_identity(identity))
    }

    fn from_identity(identity: age::x25519::Identity) -> Self {
        let recipient = identity.to_public();
        let key_id = recipient.to_string();
        Self {
            identity,
            recipient,
            key_id,
        }
    }

    /// Encrypt an arbitrary byte payload to this gateway's recipient.
    /// Used for whole-document backups rather than per-value envelopes.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        encrypt_with_recipient(plaintext, &self.recipient)
    }

    /// Decrypt a payload produced by [`seal`](Self::seal).
    pub fn unseal(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        decrypt_with_identity(ciphertext, &self.identity)
    }

    /// Derive the audit-chain key from this identity via HKDF-SHA256.
    pub fn audit_key(&self) -> Vec<u8> {
        derive_key(
            self.identity.to_string().expose_secret().as_bytes(),
            b"envault-audit-v1",
            32,
        )
    }
}

#[async_trait]
impl EncryptionGateway for AgeGateway {
    async fn encrypt(&self, plaintext: &SecretString) -> Result<CipherValue> {
        let encrypted =
            encrypt_with_recipient(plaintext.expose_secret().as_bytes(), &self.recipient)?;
        Ok(CipherValue {
            ciphertext: STANDARD.encode(&encrypted),
            key_id: self.key_id.clone(),
            format: FORMAT_AGE_X25519,
        })
    }

    async fn decrypt(&self, value: &CipherValue) -> Result<SecretString> {
        if value.format != FORMAT_AGE_X25519 {
            return Err(VaultError::InvalidCiphertext(format!(
                "unsupported payload format {}",
                value.format
            )));
        }
        let encrypted = STANDARD
            .decode(&value.ciphertext)
            .map_err(|e| VaultError::InvalidCiphertext(e.to_string()))?;
        let plaintext = decrypt_with_identity(&encrypted, &self.identity)?;
        // from_utf8 reuses the buffer, so the only plaintext copy moves
        // straight into the zeroizing wrapper.
        let text = String::from_utf8(plaintext)
            .map_err(|e| VaultError::InvalidCiphertext(format!("plaintext is not UTF-8: {}", e)))?;
        Ok(SecretString::new(text))
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }
}

/// Encrypt data to an age x25519 recipient.
pub fn encrypt_with_recipient(
    plaintext: &[u8],
    recipient: &age::x25519::Recipient,
) -> Result<Vec<u8>> {
    let encryptor = age::Encryptor::with_recipients(vec![Box::new(recipient.clone())])
        .expect("recipients not empty");

    let mut encrypted = vec![];
    let mut writer = encryptor
        .wrap_output(&mut encrypted)
        .map_err(|e| VaultError::GatewayUnavailable(e.to_string()))?;
    writer
        .write_all(plaintext)
        .map_err(|e| VaultError::GatewayUnavailable(e.to_string()))?;
    writer
        .finish()
        .map_err(|e| VaultError::GatewayUnavailable(e.to_string()))?;

    Ok(encrypted)
}

/// Decrypt data with an age x25519 identity.
pub fn decrypt_with_identity(
    ciphertext: &[u8],
    identity: &age::x25519::Identity,
) -> Result<Vec<u8>> {
    let decryptor = match age::Decryptor::new(ciphertext)
        .map_err(|e| VaultError::InvalidCiphertext(e.to_string()))?
    {
        age::Decryptor::Recipients(d) => d,
        _ => {
            return Err(VaultError::InvalidCiphertext(
                "expected recipients-encrypted data".into(),
            ))
        }
    };

    let mut decrypted = vec![];
    let mut reader = decryptor
        .decrypt(std::iter::once(identity as &dyn age::Identity))
        .map_err(|e| VaultError::InvalidCiphertext(e.to_string()))?;
    reader
        .read_to_end(&mut decrypted)
        .map_err(|e| VaultError::InvalidCiphertext(e.to_string()))?;

    Ok(decrypted)
}

/// Derive a sub-key using HKDF-SHA256.
pub fn derive_key(master: &[u8], info: &[u8], output_len: usize) -> Vec<u8> {
    let hk = Hkdf::<Sha256>::new(None, master);
    let mut okm = vec![0u8; output_len];
    hk.expand(info, &mut okm)
        .expect("HKDF output length too large");
    okm
}
