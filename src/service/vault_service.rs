//! Owner-scoped secret operations.
//!
//! The vault service composes the [`KeyService`] with a [`SecretRepository`].
//! The caller supplies an already authenticated `user_id`; ownership is
//! enforced by the repository, and a foreign secret always looks missing.

use std::sync::Arc;

use crate::error::{ResultExt, VaultError};
use crate::model::{Secret, SecretId, SecretSummary, UserId};
use crate::repository::SecretRepository;
use crate::service::KeyService;

/// User-facing CRUD over sealed secrets.
pub struct VaultService {
    keys: Arc<KeyService>,
    secrets: Arc<dyn SecretRepository>,
}

impl VaultService {
    pub fn new(keys: Arc<KeyService>, secrets: Arc<dyn SecretRepository>) -> Self {
        Self { keys, secrets }
    }

    /// Id and name of each secret owned by `user_id`. Nothing is decrypted.
    pub async fn list_secrets(&self, user_id: UserId) -> Result<Vec<SecretSummary>, VaultError> {
        self.secrets.list_secrets(user_id).await.context("list secrets")
    }

    /// Seal and store a new secret; returns its id.
    pub async fn add_secret(&self, secret: &Secret, user_id: UserId) -> Result<SecretId, VaultError> {
        const OP: &str = "add secret";

        let sealed = self.keys.seal(secret).await.context(OP)?;
        let id = self.secrets.add_secret(&sealed, user_id).await.context(OP)?;

        tracing::debug!(%user_id, secret_id = %id, "added secret");
        Ok(id)
    }

    /// Re-seal under the current active key and overwrite the stored secret.
    ///
    /// `SecretNotFound` if `secret.id` is unset or not owned by `user_id`.
    /// Ownership is checked before sealing, so a rejected update never counts
    /// against the active key.
    pub async fn update_secret(&self, secret: &Secret, user_id: UserId) -> Result<(), VaultError> {
        const OP: &str = "update secret";

        let id = secret.id.ok_or(VaultError::SecretNotFound).context(OP)?;
        self.secrets.get_secret(id, user_id).await.context(OP)?;

        let sealed = self.keys.seal(secret).await.context(OP)?;
        self.secrets.update_secret(&sealed, user_id).await.context(OP)?;

        tracing::debug!(%user_id, secret_id = %id, key_id = ?sealed.key_id, "updated secret");
        Ok(())
    }

    /// Fetch and unseal an owned secret.
    pub async fn get_secret(&self, id: SecretId, user_id: UserId) -> Result<Secret, VaultError> {
        const OP: &str = "get secret";

        let sealed = self.secrets.get_secret(id, user_id).await.context(OP)?;
        let secret = self.keys.unseal(&sealed).await.context(OP)?;

        tracing::debug!(%user_id, secret_id = %id, "read secret");
        Ok(secret)
    }

    /// Delete an owned secret. Deleting an absent secret succeeds.
    pub async fn delete_secret(&self, id: SecretId, user_id: UserId) -> Result<(), VaultError> {
        self.secrets
            .delete_secret(id, user_id)
            .await
            .context("delete secret")?;

        tracing::debug!(%user_id, secret_id = %id, "deleted secret");
        Ok(())
    }
}
