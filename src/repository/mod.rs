//! Storage contracts for data keys and secrets.
//!
//! Persistence is pluggable: the services only see these traits, injected as
//! `Arc<dyn ...>`. Two backends ship with the crate, [`memory`] for tests and
//! single-process use and [`sqlite`] for durable storage.
//!
//! Contract shared by every backend:
//! - at most one data key is active at any instant;
//! - data keys are append-only: once created a key is never changed (apart
//!   from its usage counters) nor deleted, and stays resolvable by id;
//! - every secret operation is scoped by owner, and a secret owned by someone
//!   else is indistinguishable from a missing one.

use async_trait::async_trait;

use crate::error::VaultError;
use crate::model::{DataKey, KeyId, Secret, SecretId, SecretSummary, UserId};

pub mod memory;
pub mod sqlite;

pub use memory::{InMemoryDataKeyRepository, InMemorySecretRepository};
pub use sqlite::{SqliteDataKeyRepository, SqliteSecretRepository};

/// Persistence for master-wrapped data keys.
#[async_trait]
pub trait DataKeyRepository: Send + Sync {
    /// Persist `key` under a fresh id and make it the active key.
    ///
    /// The previously active key, if any, is retired in the same atomic step.
    /// The stored record starts with zeroed usage counters.
    async fn rotate_key(&self, key: &DataKey) -> Result<DataKey, VaultError>;

    /// The active key, or `None` when no key was ever rotated in.
    async fn get_key(&self) -> Result<Option<DataKey>, VaultError>;

    /// Any key ever created, active or retired. `KeyNotFound` otherwise.
    async fn get_by_id(&self, id: KeyId) -> Result<DataKey, VaultError>;

    /// Atomically add one encryption and `data_size` bytes to a key's counters.
    async fn update_stats(&self, id: KeyId, data_size: u64) -> Result<(), VaultError>;
}

/// Persistence for sealed secrets, scoped by owner.
#[async_trait]
pub trait SecretRepository: Send + Sync {
    /// Id and name of every secret owned by `user_id`, in insertion order.
    async fn list_secrets(&self, user_id: UserId) -> Result<Vec<SecretSummary>, VaultError>;

    /// Store a sealed secret for `user_id` and return its new id.
    async fn add_secret(&self, secret: &Secret, user_id: UserId) -> Result<SecretId, VaultError>;

    /// Replace name, data and key id of an owned secret. `SecretNotFound` if
    /// `secret.id` is unset, unknown, or owned by another user.
    async fn update_secret(&self, secret: &Secret, user_id: UserId) -> Result<(), VaultError>;

    /// The sealed secret, if `user_id` owns it. `SecretNotFound` otherwise.
    async fn get_secret(&self, id: SecretId, user_id: UserId) -> Result<Secret, VaultError>;

    /// Remove an owned secret. Absent or foreign ids are a no-op.
    async fn delete_secret(&self, id: SecretId, user_id: UserId) -> Result<(), VaultError>;
}
