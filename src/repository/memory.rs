//! In-memory repositories.
//!
//! Each repository guards all of its state with one coarse mutex. Volumes of
//! keys and secrets are small, so contention is not a concern.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{DataKeyRepository, SecretRepository};
use crate::error::VaultError;
use crate::model::{DataKey, KeyId, Secret, SecretId, SecretSummary, UserId};

// ---------------------------------------------------------------------------
// Data keys
// ---------------------------------------------------------------------------

#[derive(Default)]
struct KeyState {
    keys: HashMap<KeyId, DataKey>,
    active: Option<KeyId>,
}

/// Data keys held in a map, with the active key tracked by id.
#[derive(Default)]
pub struct InMemoryDataKeyRepository {
    state: Mutex<KeyState>,
}

impl InMemoryDataKeyRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataKeyRepository for InMemoryDataKeyRepository {
    async fn rotate_key(&self, key: &DataKey) -> Result<DataKey, VaultError> {
        let mut state = self.state.lock().await;

        let id = Uuid::new_v4();
        let mut stored = key.with_id(id);
        stored.encryptions_count = 0;
        stored.encrypted_data_size = 0;

        // Inserting and switching `active` under one lock is the atomic retire.
        state.keys.insert(id, stored.clone());
        state.active = Some(id);
        Ok(stored)
    }

    async fn get_key(&self) -> Result<Option<DataKey>, VaultError> {
        let state = self.state.lock().await;
        Ok(state.active.and_then(|id| state.keys.get(&id).cloned()))
    }

    async fn get_by_id(&self, id: KeyId) -> Result<DataKey, VaultError> {
        let state = self.state.lock().await;
        state.keys.get(&id).cloned().ok_or(VaultError::KeyNotFound)
    }

    async fn update_stats(&self, id: KeyId, data_size: u64) -> Result<(), VaultError> {
        let mut state = self.state.lock().await;
        let key = state.keys.get_mut(&id).ok_or(VaultError::KeyNotFound)?;
        key.encryptions_count = key.encryptions_count.saturating_add(1);
        key.encrypted_data_size = key.encrypted_data_size.saturating_add(data_size);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

struct StoredSecret {
    owner: UserId,
    secret: Secret,
}

/// Secrets kept in insertion order together with their owner.
#[derive(Default)]
pub struct InMemorySecretRepository {
    secrets: Mutex<Vec<StoredSecret>>,
}

impl InMemorySecretRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn owned_by(entry: &StoredSecret, id: SecretId, user_id: UserId) -> bool {
    entry.owner == user_id && entry.secret.id == Some(id)
}

#[async_trait]
impl SecretRepository for InMemorySecretRepository {
    async fn list_secrets(&self, user_id: UserId) -> Result<Vec<SecretSummary>, VaultError> {
        let secrets = self.secrets.lock().await;
        Ok(secrets
            .iter()
            .filter(|entry| entry.owner == user_id)
            .filter_map(|entry| entry.secret.summary())
            .collect())
    }

    async fn add_secret(&self, secret: &Secret, user_id: UserId) -> Result<SecretId, VaultError> {
        let mut secrets = self.secrets.lock().await;
        let id = Uuid::new_v4();
        secrets.push(StoredSecret {
            owner: user_id,
            secret: secret.with_id(id),
        });
        Ok(id)
    }

    async fn update_secret(&self, secret: &Secret, user_id: UserId) -> Result<(), VaultError> {
        let id = secret.id.ok_or(VaultError::SecretNotFound)?;
        let mut secrets = self.secrets.lock().await;
        let entry = secrets
            .iter_mut()
            .find(|entry| owned_by(entry, id, user_id))
            .ok_or(VaultError::SecretNotFound)?;
        entry.secret = secret.clone();
        Ok(())
    }

    async fn get_secret(&self, id: SecretId, user_id: UserId) -> Result<Secret, VaultError> {
        let secrets = self.secrets.lock().await;
        secrets
            .iter()
            .find(|entry| owned_by(entry, id, user_id))
            .map(|entry| entry.secret.clone())
            .ok_or(VaultError::SecretNotFound)
    }

    async fn delete_secret(&self, id: SecretId, user_id: UserId) -> Result<(), VaultError> {
        let mut secrets = self.secrets.lock().await;
        secrets.retain(|entry| !owned_by(entry, id, user_id));
        Ok(())
    }
}
