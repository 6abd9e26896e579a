//! Data-key lifecycle: rotation policy, wrapping, and usage accounting.
//!
//! The key service is stateless. Everything that changes lives behind the
//! [`DataKeyRepository`]; the service only holds the repository handle, the
//! master key and the rotation policy, so one instance can be shared by any
//! number of concurrent callers.
//!
//! ## Seal
//! ```text
//! active key ── missing or over threshold? ──▶ generate, wrap, rotate_key
//!      │
//!      ▼
//! unwrap (master key) ──▶ seal payload ──▶ update_stats (must succeed)
//! ```
//!
//! Two concurrent seals may both decide to rotate. Each rotation retires the
//! previous key atomically, so the race costs one redundant key and nothing
//! else.

use std::sync::Arc;

use crate::cipher::SecretCipher;
use crate::config::RotationPolicy;
use crate::error::{ResultExt, VaultError};
use crate::keys::MasterKey;
use crate::model::{DataKey, DataKeyInfo, Secret};
use crate::repository::DataKeyRepository;

/// Why the active key had to be replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RotationReason {
    NoActiveKey,
    SizeThreshold,
    CountThreshold,
}

impl RotationReason {
    fn as_str(self) -> &'static str {
        match self {
            Self::NoActiveKey => "no active key",
            Self::SizeThreshold => "encrypted data size threshold reached",
            Self::CountThreshold => "encryptions count threshold reached",
        }
    }
}

/// Seals and unseals secrets under rotating, master-wrapped data keys.
pub struct KeyService {
    keys: Arc<dyn DataKeyRepository>,
    master: Arc<MasterKey>,
    cipher: SecretCipher,
    policy: RotationPolicy,
}

impl KeyService {
    pub fn new(
        keys: Arc<dyn DataKeyRepository>,
        master: Arc<MasterKey>,
        policy: RotationPolicy,
    ) -> Self {
        Self {
            keys,
            master,
            cipher: SecretCipher::new(),
            policy,
        }
    }

    /// The rotation policy in force.
    pub fn policy(&self) -> RotationPolicy {
        self.policy
    }

    fn rotation_reason(&self, active: Option<&DataKey>) -> Option<RotationReason> {
        let key = match active {
            None => return Some(RotationReason::NoActiveKey),
            Some(key) => key,
        };
        if key.encrypted_data_size >= self.policy.encrypted_data_size_threshold {
            Some(RotationReason::SizeThreshold)
        } else if key.encryptions_count >= self.policy.encryptions_count_threshold {
            Some(RotationReason::CountThreshold)
        } else {
            None
        }
    }

    /// Generate a fresh data key, wrap it and make it the active key.
    async fn rotate(
        &self,
        reason: RotationReason,
        retired: Option<&DataKey>,
    ) -> Result<DataKey, VaultError> {
        let wrapped = self.master.seal(&DataKey::generate()?)?;
        let stored = self.keys.rotate_key(&wrapped).await?;

        tracing::info!(
            key_id = ?stored.id,
            retired_key_id = ?retired.and_then(|key| key.id),
            retired_encryptions = retired.map(|key| key.encryptions_count),
            retired_bytes = retired.map(|key| key.encrypted_data_size),
            reason = reason.as_str(),
            "rotated data key"
        );
        Ok(stored)
    }

    /// The active key, rotating first if the policy says so.
    async fn active_for_seal(&self) -> Result<DataKey, VaultError> {
        let active = self.keys.get_key().await?;
        match self.rotation_reason(active.as_ref()) {
            Some(reason) => self.rotate(reason, active.as_ref()).await,
            None => active.ok_or(VaultError::KeyNotFound),
        }
    }

    /// Seal `secret.data` under the active data key.
    ///
    /// The returned copy carries the ciphertext and the id of the sealing key.
    /// The key's usage counters are updated before returning; if that update
    /// fails the whole call fails, so no sealed value escapes unaccounted.
    pub async fn seal(&self, secret: &Secret) -> Result<Secret, VaultError> {
        const OP: &str = "seal";

        let wrapped = self.active_for_seal().await.context(OP)?;
        let key_id = wrapped.id.ok_or(VaultError::KeyNotFound).context(OP)?;
        let data_key = self.master.unseal(&wrapped).context(OP)?;

        let sealed = self.cipher.seal(secret, &data_key).context(OP)?;

        let data_size = secret.data.len() as u64;
        if let Err(err) = self.keys.update_stats(key_id, data_size).await {
            tracing::warn!(%key_id, error = %err, "failed to record data key usage");
            return Err(err).context(OP);
        }

        tracing::debug!(%key_id, bytes = data_size, "sealed secret");
        Ok(sealed)
    }

    /// Unseal a stored secret with the key that sealed it, active or retired.
    pub async fn unseal(&self, secret: &Secret) -> Result<Secret, VaultError> {
        const OP: &str = "unseal";

        let key_id = secret.key_id.ok_or(VaultError::KeyNotFound).context(OP)?;
        let wrapped = self.keys.get_by_id(key_id).await.context(OP)?;
        let data_key = self.master.unseal(&wrapped).context(OP)?;

        let unsealed = self.cipher.unseal(secret, &data_key).context(OP)?;

        tracing::debug!(%key_id, "unsealed secret");
        Ok(unsealed)
    }

    /// Usage counters of the active key, if there is one.
    pub async fn active_key(&self) -> Result<Option<DataKeyInfo>, VaultError> {
        let active = self.keys.get_key().await.context("active key")?;
        Ok(active.map(|key| key.info()))
    }
}
