use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use secrecy::SecretString;

use crate::error::{Result, VaultError};
use crate::types::*;

/// Everything a strategy gets to know about the secret being rotated.
/// Strategies never see the vault document itself.
#[derive(Debug, Clone)]
pub struct RotationContext {
    pub project: String,
    pub key: String,
    pub classification: String,
    pub current_version: u32,
}

/// Produces a candidate replacement value.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, ctx: &RotationContext) -> Result<SecretString>;
}

/// Confirms a staged candidate works before it becomes the active value.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, ctx: &RotationContext, candidate: &SecretString) -> Result<()>;
}

/// URL-safe alphabet; 64 symbols so sampling stays uniform.
const DEFAULT_CHARSET: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Default generator: a random string from a fixed charset, using the
/// thread-local CSPRNG.
pub struct RandomGenerator {
    length: usize,
    charset: Vec<char>,
}

impl RandomGenerator {
    pub fn new(length: usize) -> Self {
        Self::with_charset(length, DEFAULT_CHARSET)
    }

    pub fn with_charset(length: usize, charset: &str) -> Self {
        Self {
            length: length.max(1),
            charset: charset.chars().collect(),
        }
    }
}

#[async_trait]
impl Generator for RandomGenerator {
    async fn generate(&self, _ctx: &RotationContext) -> Result<SecretString> {
        if self.charset.is_empty() {
            return Err(VaultError::GenerationFailure(
                "generator charset is empty".to_string(),
            ));
        }
        let mut rng = rand::thread_rng();
        let value: String = (0..self.length)
            .map(|_| self.charset[rng.gen_range(0..self.charset.len())])
            .collect();
        Ok(SecretString::new(value))
    }
}

/// Verifier that accepts every candidate. Used when no verifier is
/// registered for a classification.
pub struct NoopVerifier;

#[async_trait]
impl Verifier for NoopVerifier {
    async fn verify(&self, _ctx: &RotationContext, _candidate: &SecretString) -> Result<()> {
        Ok(())
    }
}

/// Per-classification strategy lookup. Unregistered classifications fall
/// back to the default generator and skip verification.
pub struct StrategyRegistry {
    generators: BTreeMap<String, Arc<dyn Generator>>,
    verifiers: BTreeMap<String, Arc<dyn Verifier>>,
    default_generator: Arc<dyn Generator>,
}

impl StrategyRegistry {
    pub fn new(default_generator: Arc<dyn Generator>) -> Self {
        Self {
            generators: BTreeMap::new(),
            verifiers: BTreeMap::new(),
            default_generator,
        }
    }

    /// Registry with the stock random generator at the given length.
    pub fn with_defaults(generator_length: usize) -> Self {
        Self::new(Arc::new(RandomGenerator::new(generator_length)))
    }

    pub fn register_generator(&mut self, classification: &str, generator: Arc<dyn Generator>) {
        self.generators
            .insert(classification.to_string(), generator);
    }

    pub fn register_verifier(&mut self, classification: &str, verifier: Arc<dyn Verifier>) {
        self.verifiers.insert(classification.to_string(), verifier);
    }

    pub fn generator(&self, classification: &str) -> Arc<dyn Generator> {
        self.generators
            .get(classification)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.default_generator))
    }

    pub fn verifier(&self, classification: &str) -> Option<Arc<dyn Verifier>> {
        self.verifiers.get(classification).cloned()
    }
}
