pub mod age;

pub use self::age::AgeGateway;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::Result;
use crate::vault::entry::CipherValue;

/// Envelope-encryption backend for secret values.
///
/// The store never sees plaintext at rest: every value is passed through a
/// gateway on the way in and out. Implementations may be local (the age
/// implementation in this crate) or remote; callers treat both uniformly
/// and bound each call with the configured gateway timeout.
#[async_trait]
pub trait EncryptionGateway: Send + Sync {
    /// Encrypt one plaintext value into an opaque payload.
    async fn encrypt(&self, plaintext: &SecretString) -> Result<CipherValue>;

    /// Recover the plaintext for a payload previously produced by `encrypt`.
    async fn decrypt(&self, value: &CipherValue) -> Result<SecretString>;

    /// Identifier of the key this gateway encrypts to.
    fn key_id(&self) -> &str;
}
