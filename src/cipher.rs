//! Sealing secret payloads under a data key.

use crate::crypto;
use crate::error::{ResultExt, VaultError};
use crate::model::{DataKey, Secret};

/// Seals and unseals [`Secret`] payloads with a plaintext [`DataKey`].
///
/// Stateless; the data key is passed per call so a retired key can unseal
/// old secrets while the active key seals new ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretCipher;

impl SecretCipher {
    pub fn new() -> Self {
        Self
    }

    /// Encrypt `secret.data` and stamp the result with the key's id.
    pub fn seal(&self, secret: &Secret, data_key: &DataKey) -> Result<Secret, VaultError> {
        let ciphertext =
            crypto::seal(data_key.key_bytes(), &secret.data).context("seal secret")?;
        Ok(secret.with_payload(ciphertext, data_key.id))
    }

    /// Decrypt `secret.data`. The returned copy has `key_id` cleared.
    pub fn unseal(&self, secret: &Secret, data_key: &DataKey) -> Result<Secret, VaultError> {
        let plaintext =
            crypto::unseal(data_key.key_bytes(), &secret.data).context("unseal secret")?;
        Ok(secret.with_payload(plaintext, None))
    }
}
