//! Minimal example: two users sharing one vault.
//!
//! Stores, updates and deletes secrets while a small count threshold forces
//! data-key rotation, then shows that secrets sealed under retired keys stay
//! readable and that users cannot see each other's data.
//!
//! Run with: `cargo run --example vault_demo`
//!
//! Set `ENVAULT_MASTER_KEY` (base64, 32 bytes) to reuse a master key, and
//! `DATABASE_URL` (e.g. `sqlite://vault.db?mode=rwc`) to persist to sqlite
//! instead of memory. `RUST_LOG=envault=debug` shows the vault's events.

use std::sync::Arc;

use base64::Engine;
use envault::config::ENV_MASTER_KEY;
use envault::repository::{sqlite, InMemoryDataKeyRepository, InMemorySecretRepository};
use envault::repository::{SqliteDataKeyRepository, SqliteSecretRepository};
use envault::{
    crypto, DataKeyRepository, ErrorKind, KeyService, Secret, SecretRepository,
    VaultConfig, VaultService,
};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("envault=info")),
        )
        .init();

    // 1. Configuration. Only a missing master key is replaced by a throwaway
    // one; any other configuration error stops the demo.
    let master_key = match std::env::var(ENV_MASTER_KEY) {
        Ok(key) => key,
        Err(_) => {
            println!("{} is not set; generating a throwaway master key", ENV_MASTER_KEY);
            base64::engine::general_purpose::STANDARD.encode(crypto::generate_random_key()?)
        }
    };
    let mut config = VaultConfig::from_lookup(|name| {
        if name == ENV_MASTER_KEY {
            Some(master_key.clone())
        } else {
            std::env::var(name).ok()
        }
    })?;
    // Rotate often so the demo shows several data keys.
    config.rotation.encryptions_count_threshold = 2;

    // 2. Storage
    let (keys, secrets): (Arc<dyn DataKeyRepository>, Arc<dyn SecretRepository>) =
        match std::env::var("DATABASE_URL") {
            Ok(url) => {
                let pool = sqlite::connect(&url).await?;
                println!("Using sqlite at {url}");
                (
                    Arc::new(SqliteDataKeyRepository::new(pool.clone())),
                    Arc::new(SqliteSecretRepository::new(pool)),
                )
            }
            Err(_) => (
                Arc::new(InMemoryDataKeyRepository::new()),
                Arc::new(InMemorySecretRepository::new()),
            ),
        };

    let key_service = Arc::new(KeyService::new(
        keys,
        Arc::new(config.master_key()?),
        config.rotation,
    ));
    let vault = VaultService::new(Arc::clone(&key_service), secrets);

    // 3. Two users store secrets
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    let login = vault
        .add_secret(&Secret::new("login", b"alice:hunter2".to_vec()), alice)
        .await?;
    let card = vault
        .add_secret(&Secret::new("card", b"4111 1111 1111 1111".to_vec()), alice)
        .await?;
    vault
        .add_secret(&Secret::new("note", b"bob's diary".to_vec()), bob)
        .await?;

    for summary in vault.list_secrets(alice).await? {
        println!("alice owns {} ({})", summary.name, summary.id);
    }

    // 4. Updating re-seals under whatever key is active now
    vault
        .update_secret(&Secret::new("login", b"alice:correct-horse".to_vec()).with_id(login), alice)
        .await?;

    if let Some(active) = key_service.active_key().await? {
        println!(
            "active data key {:?}: {} seals, {} bytes",
            active.id, active.encryptions_count, active.encrypted_data_size
        );
    }

    // 5. Everything is still readable, including secrets under retired keys
    let card_plain = vault.get_secret(card, alice).await?;
    let login_plain = vault.get_secret(login, alice).await?;
    println!("card  = {}", String::from_utf8_lossy(&card_plain.data));
    println!("login = {}", String::from_utf8_lossy(&login_plain.data));

    // 6. Ownership isolation
    match vault.get_secret(card, bob).await {
        Err(err) if err.kind() == ErrorKind::SecretNotFound => {
            println!("bob cannot read alice's card: {err}")
        }
        other => println!("unexpected: {other:?}"),
    }

    // 7. Delete
    vault.delete_secret(card, alice).await?;
    println!("alice now owns {} secret(s)", vault.list_secrets(alice).await?.len());

    Ok(())
}
