//! # envault
//!
//! Envelope-encrypted secrets vault.
//!
//! Secret payloads are sealed with AES-256-GCM under a rotating *data key*.
//! Data keys are themselves sealed ("wrapped") by a single *master key* that
//! the operator supplies at startup and that only ever lives in memory. A data
//! key is rotated out once it has sealed too many bytes or too many payloads;
//! retired keys stay in storage forever so older secrets remain readable.
//!
//! ```text
//! VaultService ──▶ KeyService ──▶ MasterKey / SecretCipher ──▶ crypto (ring)
//!      │                │
//!      ▼                ▼
//! SecretRepository  DataKeyRepository      (memory | sqlite)
//! ```
//!
//! ## Public API
//!
//! Callers construct a [`KeyService`] and a [`VaultService`] with injected
//! repositories. Raw AES primitives are exposed in [`crypto`] for callers that
//! need to seal outside the vault.

pub mod cipher;
pub mod config;
pub mod crypto;
pub mod error;
pub mod keys;
pub mod model;
pub mod repository;
pub mod service;

pub use cipher::SecretCipher;
pub use config::{RotationPolicy, VaultConfig};
pub use error::{ErrorKind, VaultError};
pub use keys::MasterKey;
pub use model::{DataKey, DataKeyInfo, KeyId, Secret, SecretId, SecretSummary, UserId};
pub use repository::{DataKeyRepository, SecretRepository};
pub use service::{KeyService, VaultService};

/// Generate a cryptographically secure master key.
///
/// Useful for provisioning and tests. In production the master key should be
/// generated once, stored by the operator outside the vault, and supplied
/// through [`VaultConfig`] on every start.
pub fn generate_master_key() -> Result<MasterKey, VaultError> {
    let bytes = zeroize::Zeroizing::new(crypto::generate_random_key()?);
    Ok(MasterKey::from_bytes(bytes.to_vec()))
}

/// Apply the vault schema to a sqlite pool.
///
/// Creates the `keys` and `secrets` tables. Safe to run on every start.
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<(), VaultError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
