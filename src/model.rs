//! Vault records: data keys and secrets.
//!
//! Records are values. Sealing, unsealing and wrapping always produce a new
//! record; the input is never mutated in place.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{self, KEY_LEN};
use crate::error::VaultError;

/// Identifies a data key. Assigned by the key repository.
pub type KeyId = Uuid;

/// Identifies a secret. Assigned by the secret repository.
pub type SecretId = Uuid;

/// Identifies the owner of a secret. Supplied by the authentication layer.
pub type UserId = Uuid;

// ---------------------------------------------------------------------------
// Data key
// ---------------------------------------------------------------------------

/// A rotating symmetric key together with its cumulative usage counters.
///
/// At rest `key` holds the master-wrapped ciphertext; the plaintext form only
/// exists for the duration of a single seal or unseal call. Key bytes are
/// zeroised on drop and redacted from `Debug`.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct DataKey {
    key: Vec<u8>,
    /// `None` until the repository persists the key.
    #[zeroize(skip)]
    pub id: Option<KeyId>,
    /// Total plaintext bytes ever sealed under this key.
    #[zeroize(skip)]
    pub encrypted_data_size: u64,
    /// Total seal operations performed under this key.
    #[zeroize(skip)]
    pub encryptions_count: u64,
}

impl DataKey {
    /// Generate a fresh AES-256 data key. The id stays unset.
    pub fn generate() -> Result<Self, VaultError> {
        let mut bytes = crypto::generate_random_key()?;
        let key = Self::from_bytes(bytes.to_vec());
        bytes.zeroize();
        Ok(key)
    }

    /// Build an unpersisted key record around raw (or wrapped) key bytes.
    pub fn from_bytes(key: Vec<u8>) -> Self {
        Self {
            key,
            id: None,
            encrypted_data_size: 0,
            encryptions_count: 0,
        }
    }

    /// Borrow the key bytes, wrapped or plaintext depending on the record.
    pub fn key_bytes(&self) -> &[u8] {
        &self.key
    }

    /// Return a copy of this record carrying `key` instead of the current bytes.
    pub fn with_key(&self, key: Vec<u8>) -> Self {
        Self {
            key,
            id: self.id,
            encrypted_data_size: self.encrypted_data_size,
            encryptions_count: self.encryptions_count,
        }
    }

    /// Return a copy of this record with the given id.
    pub fn with_id(&self, id: KeyId) -> Self {
        let mut copy = self.clone();
        copy.id = Some(id);
        copy
    }

    /// Usage metadata without key bytes.
    pub fn info(&self) -> DataKeyInfo {
        DataKeyInfo {
            id: self.id,
            encrypted_data_size: self.encrypted_data_size,
            encryptions_count: self.encryptions_count,
        }
    }
}

impl fmt::Debug for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataKey")
            .field("id", &self.id)
            .field("key", &"[REDACTED]")
            .field("encrypted_data_size", &self.encrypted_data_size)
            .field("encryptions_count", &self.encryptions_count)
            .finish()
    }
}

/// Usage counters of a data key, safe to hand to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataKeyInfo {
    pub id: Option<KeyId>,
    pub encrypted_data_size: u64,
    pub encryptions_count: u64,
}

/// True when `key` has the length of an AES-256 data key.
pub(crate) fn is_data_key_len(key: &[u8]) -> bool {
    key.len() == KEY_LEN
}

// ---------------------------------------------------------------------------
// Secret
// ---------------------------------------------------------------------------

/// A named payload owned by one user.
///
/// Persisted secrets always hold ciphertext in `data` and the id of the key
/// that sealed it in `key_id`. An unsealed copy has `key_id == None`.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    /// `None` until the repository stores the secret.
    #[serde(default)]
    pub id: Option<SecretId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub data: Vec<u8>,
    /// The data key that sealed `data`; `None` means "not currently sealed".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<KeyId>,
}

impl Secret {
    /// A new, unsaved secret.
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            id: None,
            name: name.into(),
            data: data.into(),
            key_id: None,
        }
    }

    /// Return a copy of this secret carrying a different id.
    pub fn with_id(&self, id: SecretId) -> Self {
        Self {
            id: Some(id),
            ..self.clone()
        }
    }

    /// Return a copy with `data` replaced and `key_id` set as given.
    pub(crate) fn with_payload(&self, data: Vec<u8>, key_id: Option<KeyId>) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            data,
            key_id,
        }
    }

    /// Listing projection: identity and name, never the payload.
    pub fn summary(&self) -> Option<SecretSummary> {
        self.id.map(|id| SecretSummary {
            id,
            name: self.name.clone(),
        })
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("data", &format_args!("[{} bytes]", self.data.len()))
            .field("key_id", &self.key_id)
            .finish()
    }
}

/// What `list_secrets` returns. Carries no payload bytes by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretSummary {
    pub id: SecretId,
    pub name: String,
}
