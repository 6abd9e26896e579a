//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use envault::repository::{
    InMemoryDataKeyRepository, InMemorySecretRepository, SqliteDataKeyRepository,
    SqliteSecretRepository,
};
use envault::{
    generate_master_key, DataKeyRepository, KeyService, RotationPolicy, SecretRepository,
    VaultService,
};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

/// A migrated in-memory sqlite database.
///
/// One connection only: every connection to `sqlite::memory:` opens its own
/// empty database.
pub async fn sqlite_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    envault::run_migrations(&pool).await.unwrap();
    pool
}

/// Both repositories of one backend.
pub struct Backend {
    pub keys: Arc<dyn DataKeyRepository>,
    pub secrets: Arc<dyn SecretRepository>,
}

pub fn memory_backend() -> Backend {
    Backend {
        keys: Arc::new(InMemoryDataKeyRepository::new()),
        secrets: Arc::new(InMemorySecretRepository::new()),
    }
}

pub async fn sqlite_backend() -> Backend {
    let pool = sqlite_pool().await;
    Backend {
        keys: Arc::new(SqliteDataKeyRepository::new(pool.clone())),
        secrets: Arc::new(SqliteSecretRepository::new(pool)),
    }
}

pub fn key_service(keys: Arc<dyn DataKeyRepository>, policy: RotationPolicy) -> KeyService {
    KeyService::new(keys, Arc::new(generate_master_key().unwrap()), policy)
}

pub fn vault(backend: &Backend, policy: RotationPolicy) -> VaultService {
    let keys = Arc::new(key_service(Arc::clone(&backend.keys), policy));
    VaultService::new(keys, Arc::clone(&backend.secrets))
}
