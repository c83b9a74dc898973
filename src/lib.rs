//! envault — secrets vault store & rotation engine.
//!
//! A versioned, policy-driven record store for secret values keyed by
//! (project, key): dotenv import, envelope encryption through a gateway
//! seam, scheduled/triggered rotation with pluggable strategies, and an
//! append-only HMAC-chained audit log. The CLI is gated behind the `cli`
//! feature and is private to the binary.
//!
//! # Quick start
//!
//! ```no_run
//! use envault::api::EnvaultClient;
//! use secrecy::SecretString;
//!
//! # async fn demo() -> envault::error::Result<()> {
//! let client = EnvaultClient::init(std::path::Path::new("/tmp/demo-vault")).await?;
//! client
//!     .put("production", "API_KEY", SecretString::new("sk-secret".into()))
//!     .await?;
//! let job = client.rotate("production", "API_KEY").await?;
//! assert_eq!(job.new_version, Some(2));
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod audit;
pub mod config;
pub mod error;
pub mod gateway;
pub mod import;
pub mod retry;
pub mod rotation;
pub mod types;
pub mod vault;
