//! SQLite-backed repositories using sqlx.
//!
//! Both repositories share one pool. Rotation runs inside a transaction;
//! usage accounting is a single in-place `UPDATE`, so concurrent seals never
//! lose an increment.

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use super::{DataKeyRepository, SecretRepository};
use crate::error::{ResultExt, VaultError};
use crate::model::{DataKey, KeyId, Secret, SecretId, SecretSummary, UserId};

/// Pool size for file databases.
const MAX_CONNECTIONS: u32 = 5;

/// Open a pool on `database_url` and apply the vault schema.
///
/// An in-memory URL gets a single connection, since every connection to it
/// opens a separate empty database.
///
/// For a pool shared with other components, call [`crate::run_migrations`]
/// on it instead and hand it to the repository constructors.
pub async fn connect(database_url: &str) -> Result<SqlitePool, VaultError> {
    let max_connections = if is_in_memory(database_url) {
        1
    } else {
        MAX_CONNECTIONS
    };
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .context("connect sqlite")?;

    crate::run_migrations(&pool).await?;

    Ok(pool)
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

fn parse_id(raw: &str) -> Result<Uuid, VaultError> {
    Uuid::parse_str(raw).map_err(VaultError::repository)
}

fn to_u64(value: i64) -> Result<u64, VaultError> {
    u64::try_from(value).map_err(VaultError::repository)
}

// ---------------------------------------------------------------------------
// Data keys
// ---------------------------------------------------------------------------

/// Data keys in the `keys` table. Retired keys are flagged `is_disposed`.
#[derive(Clone)]
pub struct SqliteDataKeyRepository {
    pool: SqlitePool,
}

impl SqliteDataKeyRepository {
    /// Use an existing pool. The schema must already be migrated.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn key_from_row(row: &SqliteRow) -> Result<DataKey, VaultError> {
    let id: String = row.try_get("key_id")?;
    let key_data: Vec<u8> = row.try_get("key_data")?;

    let mut key = DataKey::from_bytes(key_data).with_id(parse_id(&id)?);
    key.encryptions_count = to_u64(row.try_get("encryptions_count")?)?;
    key.encrypted_data_size = to_u64(row.try_get("encrypted_data_size")?)?;
    Ok(key)
}

#[async_trait]
impl DataKeyRepository for SqliteDataKeyRepository {
    async fn rotate_key(&self, key: &DataKey) -> Result<DataKey, VaultError> {
        const OP: &str = "rotate key";

        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await.context(OP)?;

        sqlx::query("UPDATE keys SET is_disposed = 1 WHERE is_disposed = 0")
            .execute(&mut *tx)
            .await
            .context(OP)?;

        sqlx::query("INSERT INTO keys (key_id, key_data) VALUES (?, ?)")
            .bind(id.to_string())
            .bind(key.key_bytes())
            .execute(&mut *tx)
            .await
            .context(OP)?;

        tx.commit().await.context(OP)?;

        tracing::debug!(key_id = %id, "stored rotated data key");

        let mut stored = key.with_id(id);
        stored.encryptions_count = 0;
        stored.encrypted_data_size = 0;
        Ok(stored)
    }

    async fn get_key(&self) -> Result<Option<DataKey>, VaultError> {
        let row = sqlx::query(
            "SELECT key_id, key_data, encryptions_count, encrypted_data_size
             FROM keys WHERE is_disposed = 0",
        )
        .fetch_optional(&self.pool)
        .await
        .context("get key")?;

        row.as_ref().map(key_from_row).transpose().context("get key")
    }

    async fn get_by_id(&self, id: KeyId) -> Result<DataKey, VaultError> {
        let row = sqlx::query(
            "SELECT key_id, key_data, encryptions_count, encrypted_data_size
             FROM keys WHERE key_id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("get key by id")?;

        match row {
            Some(row) => key_from_row(&row).context("get key by id"),
            None => Err(VaultError::KeyNotFound),
        }
    }

    async fn update_stats(&self, id: KeyId, data_size: u64) -> Result<(), VaultError> {
        let delta = i64::try_from(data_size).map_err(VaultError::repository)?;

        let result = sqlx::query(
            "UPDATE keys
             SET encryptions_count = encryptions_count + 1,
                 encrypted_data_size = encrypted_data_size + ?
             WHERE key_id = ?",
        )
        .bind(delta)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .context("update key stats")?;

        if result.rows_affected() == 0 {
            return Err(VaultError::KeyNotFound);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

/// Secrets in the `secrets` table. Every statement filters on `user_id`.
#[derive(Clone)]
pub struct SqliteSecretRepository {
    pool: SqlitePool,
}

impl SqliteSecretRepository {
    /// Use an existing pool. The schema must already be migrated.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SecretRepository for SqliteSecretRepository {
    async fn list_secrets(&self, user_id: UserId) -> Result<Vec<SecretSummary>, VaultError> {
        let rows = sqlx::query("SELECT secret_id, name FROM secrets WHERE user_id = ? ORDER BY rowid")
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await
            .context("list secrets")?;

        let mut secrets = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("secret_id").context("list secrets")?;
            secrets.push(SecretSummary {
                id: parse_id(&id).context("list secrets")?,
                name: row.try_get("name").context("list secrets")?,
            });
        }
        Ok(secrets)
    }

    async fn add_secret(&self, secret: &Secret, user_id: UserId) -> Result<SecretId, VaultError> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO secrets (secret_id, user_id, key_id, name, data) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .bind(secret.key_id.map(|key_id| key_id.to_string()))
        .bind(&secret.name)
        .bind(&secret.data)
        .execute(&self.pool)
        .await
        .context("add secret")?;
        Ok(id)
    }

    async fn update_secret(&self, secret: &Secret, user_id: UserId) -> Result<(), VaultError> {
        let id = secret.id.ok_or(VaultError::SecretNotFound)?;
        let result = sqlx::query(
            "UPDATE secrets SET key_id = ?, name = ?, data = ?
             WHERE secret_id = ? AND user_id = ?",
        )
        .bind(secret.key_id.map(|key_id| key_id.to_string()))
        .bind(&secret.name)
        .bind(&secret.data)
        .bind(id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await
        .context("update secret")?;

        if result.rows_affected() == 0 {
            return Err(VaultError::SecretNotFound);
        }
        Ok(())
    }

    async fn get_secret(&self, id: SecretId, user_id: UserId) -> Result<Secret, VaultError> {
        let row = sqlx::query(
            "SELECT key_id, name, data FROM secrets WHERE secret_id = ? AND user_id = ?",
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("get secret")?
        .ok_or(VaultError::SecretNotFound)?;

        let key_id: Option<String> = row.try_get("key_id").context("get secret")?;
        Ok(Secret {
            id: Some(id),
            name: row.try_get("name").context("get secret")?,
            data: row.try_get("data").context("get secret")?,
            key_id: key_id.as_deref().map(parse_id).transpose().context("get secret")?,
        })
    }

    async fn delete_secret(&self, id: SecretId, user_id: UserId) -> Result<(), VaultError> {
        sqlx::query("DELETE FROM secrets WHERE secret_id = ? AND user_id = ?")
            .bind(id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .context("delete secret")?;
        Ok(())
    }
}
