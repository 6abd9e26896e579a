//! Data-key lifecycle: rotation thresholds, historical keys, and usage
//! accounting failures.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use envault::repository::{sqlite, InMemoryDataKeyRepository, SqliteDataKeyRepository};
use envault::{
    generate_master_key, DataKey, DataKeyRepository, ErrorKind, KeyId, KeyService, MasterKey,
    RotationPolicy, Secret, VaultError,
};

fn size_policy(threshold: u64) -> RotationPolicy {
    RotationPolicy {
        encrypted_data_size_threshold: threshold,
        ..RotationPolicy::default()
    }
}

fn count_policy(threshold: u64) -> RotationPolicy {
    RotationPolicy {
        encryptions_count_threshold: threshold,
        ..RotationPolicy::default()
    }
}

#[tokio::test]
async fn first_seal_creates_the_active_key() {
    let repo = Arc::new(InMemoryDataKeyRepository::new());
    let service = common::key_service(repo.clone(), RotationPolicy::default());

    let sealed = service.seal(&Secret::new("n", b"data".to_vec())).await.unwrap();

    let active = repo.get_key().await.unwrap().unwrap();
    assert_eq!(sealed.key_id, active.id);
    assert_eq!(active.encryptions_count, 1);
    assert_eq!(active.encrypted_data_size, 4);
}

#[tokio::test]
async fn keys_are_stored_wrapped() {
    let repo = Arc::new(InMemoryDataKeyRepository::new());
    let master = Arc::new(generate_master_key().unwrap());
    let service = KeyService::new(repo.clone(), Arc::clone(&master), RotationPolicy::default());

    service.seal(&Secret::new("n", b"data".to_vec())).await.unwrap();

    let stored = repo.get_key().await.unwrap().unwrap();
    // nonce + 32 key bytes + tag
    assert_eq!(stored.key_bytes().len(), 12 + 32 + 16);
    assert_eq!(master.unseal(&stored).unwrap().key_bytes().len(), 32);
}

#[tokio::test]
async fn rotate_after_size_threshold() {
    let repo = Arc::new(InMemoryDataKeyRepository::new());
    let service = common::key_service(repo.clone(), size_policy(5));

    let first = service.seal(&Secret::new("a", b"12345".to_vec())).await.unwrap();
    let second = service.seal(&Secret::new("b", Vec::new())).await.unwrap();

    assert_ne!(first.key_id, second.key_id);
    let active = repo.get_key().await.unwrap().unwrap();
    assert_eq!(active.id, second.key_id);
}

#[tokio::test]
async fn rotate_after_count_threshold() {
    let repo = Arc::new(InMemoryDataKeyRepository::new());
    let service = common::key_service(repo.clone(), count_policy(1));

    let first = service.seal(&Secret::default()).await.unwrap();
    let second = service.seal(&Secret::default()).await.unwrap();

    assert_ne!(first.key_id, second.key_id);
    assert_eq!(repo.get_key().await.unwrap().unwrap().id, second.key_id);
}

#[tokio::test]
async fn key_is_reused_below_thresholds() {
    let repo = Arc::new(InMemoryDataKeyRepository::new());
    let service = common::key_service(repo.clone(), RotationPolicy::default());

    let a = service.seal(&Secret::new("a", b"abc".to_vec())).await.unwrap();
    let b = service.seal(&Secret::new("b", b"defgh".to_vec())).await.unwrap();

    assert_eq!(a.key_id, b.key_id);
    let info = service.active_key().await.unwrap().unwrap();
    assert_eq!(info.id, a.key_id);
    assert_eq!(info.encryptions_count, 2);
    assert_eq!(info.encrypted_data_size, 8);
}

#[tokio::test]
async fn secrets_sealed_under_retired_keys_stay_readable() {
    let repo = Arc::new(InMemoryDataKeyRepository::new());
    let service = common::key_service(repo.clone(), count_policy(1));

    let oldest = service.seal(&Secret::new("a", b"first".to_vec())).await.unwrap();
    let middle = service.seal(&Secret::new("b", b"second".to_vec())).await.unwrap();
    let newest = service.seal(&Secret::new("c", b"third".to_vec())).await.unwrap();

    // Two rotations happened; the first key is retired.
    assert_ne!(repo.get_key().await.unwrap().unwrap().id, oldest.key_id);

    assert_eq!(service.unseal(&oldest).await.unwrap().data, b"first");
    assert_eq!(service.unseal(&middle).await.unwrap().data, b"second");
    assert_eq!(service.unseal(&newest).await.unwrap().data, b"third");
}

#[tokio::test]
async fn unseal_clears_key_id_and_keeps_name() {
    let service = common::key_service(
        Arc::new(InMemoryDataKeyRepository::new()),
        RotationPolicy::default(),
    );
    let sealed = service.seal(&Secret::new("card", b"4111".to_vec())).await.unwrap();

    let unsealed = service.unseal(&sealed).await.unwrap();

    assert_eq!(unsealed.name, "card");
    assert_eq!(unsealed.data, b"4111");
    assert!(unsealed.key_id.is_none());
}

#[tokio::test]
async fn unseal_without_known_key_fails() {
    let service = common::key_service(
        Arc::new(InMemoryDataKeyRepository::new()),
        RotationPolicy::default(),
    );

    let unsealed = Secret::new("n", b"x".to_vec());
    let err = service.unseal(&unsealed).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::KeyNotFound);

    let dangling = Secret {
        key_id: Some(uuid::Uuid::new_v4()),
        ..unsealed
    };
    let err = service.unseal(&dangling).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::KeyNotFound);
}

#[tokio::test]
async fn tampered_secret_fails_to_unseal() {
    let service = common::key_service(
        Arc::new(InMemoryDataKeyRepository::new()),
        RotationPolicy::default(),
    );
    let mut sealed = service.seal(&Secret::new("n", b"payload".to_vec())).await.unwrap();
    let last = sealed.data.len() - 1;
    sealed.data[last] ^= 0x80;

    let err = service.unseal(&sealed).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecryptionFailure);
}

#[tokio::test]
async fn other_master_key_cannot_unwrap() {
    let repo: Arc<dyn DataKeyRepository> = Arc::new(InMemoryDataKeyRepository::new());
    let service = common::key_service(Arc::clone(&repo), RotationPolicy::default());
    let sealed = service.seal(&Secret::new("n", b"payload".to_vec())).await.unwrap();

    let intruder = common::key_service(repo, RotationPolicy::default());
    let err = intruder.unseal(&sealed).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecryptionFailure);
}

#[tokio::test]
async fn wrong_sized_master_key_fails_to_seal() {
    let service = KeyService::new(
        Arc::new(InMemoryDataKeyRepository::new()),
        Arc::new(MasterKey::from_bytes(b"short".to_vec())),
        RotationPolicy::default(),
    );

    let err = service.seal(&Secret::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidKey);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_seals_never_lose_usage() {
    const SEALS: usize = 64;

    let repo = Arc::new(InMemoryDataKeyRepository::new());
    let service = Arc::new(common::key_service(repo.clone(), count_policy(5)));

    let mut handles = Vec::with_capacity(SEALS);
    for i in 0..SEALS {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            let secret = Secret::new(format!("s{i}"), vec![i as u8; 3]);
            service.seal(&secret).await
        }));
    }
    let mut sealed = Vec::with_capacity(SEALS);
    for handle in handles {
        sealed.push(handle.await.unwrap().unwrap());
    }

    let mut key_ids: Vec<KeyId> = sealed.iter().filter_map(|s| s.key_id).collect();
    key_ids.sort();
    key_ids.dedup();

    let mut total_count = 0;
    let mut total_size = 0;
    for id in &key_ids {
        let key = repo.get_by_id(*id).await.unwrap();
        total_count += key.encryptions_count;
        total_size += key.encrypted_data_size;
    }
    assert_eq!(total_count, SEALS as u64);
    assert_eq!(total_size, 3 * SEALS as u64);

    for (i, secret) in sealed.iter().enumerate() {
        assert_eq!(service.unseal(secret).await.unwrap().data, vec![i as u8; 3]);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sqlite_seals_keep_one_active_key() {
    const SEALS: usize = 64;

    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("vault.db").display());
    let pool = sqlite::connect(&url).await.unwrap();
    let repo: Arc<dyn DataKeyRepository> = Arc::new(SqliteDataKeyRepository::new(pool.clone()));
    let service = Arc::new(common::key_service(repo, count_policy(1)));

    let mut handles = Vec::with_capacity(SEALS);
    for i in 0..SEALS {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service.seal(&Secret::new(format!("s{i}"), vec![i as u8; 4])).await
        }));
    }
    let mut sealed = Vec::with_capacity(SEALS);
    for handle in handles {
        sealed.push(handle.await.unwrap().unwrap());
    }

    let active: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM keys WHERE is_disposed = 0")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(active, 1);

    let (total_count, total_size): (i64, i64) =
        sqlx::query_as("SELECT SUM(encryptions_count), SUM(encrypted_data_size) FROM keys")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(total_count, SEALS as i64);
    assert_eq!(total_size, 4 * SEALS as i64);

    for (i, secret) in sealed.iter().enumerate() {
        assert_eq!(service.unseal(secret).await.unwrap().data, vec![i as u8; 4]);
    }
}

// ---------------------------------------------------------------------------
// Failure injection
// ---------------------------------------------------------------------------

/// Which repository call should fail.
#[derive(Clone, Copy, PartialEq)]
enum Fail {
    GetKey,
    Rotate,
    UpdateStats,
}

/// Wraps the in-memory repository and fails one chosen call.
struct FailingKeys {
    inner: InMemoryDataKeyRepository,
    fail: Fail,
}

impl FailingKeys {
    fn new(fail: Fail) -> Self {
        Self {
            inner: InMemoryDataKeyRepository::new(),
            fail,
        }
    }

    fn check(&self, call: Fail) -> Result<(), VaultError> {
        if self.fail == call {
            return Err(VaultError::repository("injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl DataKeyRepository for FailingKeys {
    async fn rotate_key(&self, key: &DataKey) -> Result<DataKey, VaultError> {
        self.check(Fail::Rotate)?;
        self.inner.rotate_key(key).await
    }

    async fn get_key(&self) -> Result<Option<DataKey>, VaultError> {
        self.check(Fail::GetKey)?;
        self.inner.get_key().await
    }

    async fn get_by_id(&self, id: KeyId) -> Result<DataKey, VaultError> {
        self.inner.get_by_id(id).await
    }

    async fn update_stats(&self, id: KeyId, data_size: u64) -> Result<(), VaultError> {
        self.check(Fail::UpdateStats)?;
        self.inner.update_stats(id, data_size).await
    }
}

#[tokio::test]
async fn seal_fails_when_usage_cannot_be_recorded() {
    let service = common::key_service(
        Arc::new(FailingKeys::new(Fail::UpdateStats)),
        RotationPolicy::default(),
    );

    let err = service.seal(&Secret::new("n", b"data".to_vec())).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Repository);
}

#[tokio::test]
async fn seal_fails_when_rotation_fails() {
    let service =
        common::key_service(Arc::new(FailingKeys::new(Fail::Rotate)), RotationPolicy::default());

    let err = service.seal(&Secret::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Repository);
}

#[tokio::test]
async fn seal_fails_when_active_key_cannot_be_read() {
    let service =
        common::key_service(Arc::new(FailingKeys::new(Fail::GetKey)), RotationPolicy::default());

    let err = service.seal(&Secret::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Repository);
    assert!(err.to_string().starts_with("seal: "));
}

/// Never answers `get_key`.
struct StalledKeys;

#[async_trait]
impl DataKeyRepository for StalledKeys {
    async fn rotate_key(&self, _key: &DataKey) -> Result<DataKey, VaultError> {
        std::future::pending().await
    }

    async fn get_key(&self) -> Result<Option<DataKey>, VaultError> {
        std::future::pending().await
    }

    async fn get_by_id(&self, _id: KeyId) -> Result<DataKey, VaultError> {
        std::future::pending().await
    }

    async fn update_stats(&self, _id: KeyId, _data_size: u64) -> Result<(), VaultError> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn caller_timeout_cancels_a_stalled_seal() {
    let service = common::key_service(Arc::new(StalledKeys), RotationPolicy::default());

    let outcome = tokio::time::timeout(
        std::time::Duration::from_millis(50),
        service.seal(&Secret::new("n", b"data".to_vec())),
    )
    .await;

    assert!(outcome.is_err());
}
