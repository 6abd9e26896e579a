//! The master key and data-key wrapping.
//!
//! The master key is the single root secret of the vault. It is supplied by
//! the operator once per process start, lives only in memory, and is used
//! for exactly one thing: wrapping and unwrapping data-key bytes. It never
//! touches secret payloads directly.
//!
//! ```text
//! master key ──wraps──▶ data key (rotating) ──seals──▶ secret payloads
//! ```

use std::fmt;

use zeroize::Zeroizing;

use crate::crypto;
use crate::error::{ResultExt, VaultError};
use crate::model::{self, DataKey};

/// The vault's root secret.
///
/// - Not `Clone`. Share it behind an `Arc` instead of duplicating the bytes.
/// - Zeroised on drop.
/// - Redacted from `Debug`; never logged, never persisted.
pub struct MasterKey {
    bytes: Zeroizing<Vec<u8>>,
}

impl MasterKey {
    /// Construct a `MasterKey` from operator-supplied bytes.
    ///
    /// The length is not checked here: wrapping with a master key of the
    /// wrong size fails with `InvalidKey` at use.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: Zeroizing::new(bytes.into()),
        }
    }

    /// Wrap a plaintext data key.
    ///
    /// Returns a copy of `data_key` whose key bytes are the master-sealed
    /// ciphertext; id and counters are carried over unchanged.
    pub fn seal(&self, data_key: &DataKey) -> Result<DataKey, VaultError> {
        let wrapped = crypto::seal(&self.bytes, data_key.key_bytes()).context("wrap data key")?;
        Ok(data_key.with_key(wrapped))
    }

    /// Unwrap a data key loaded from storage.
    ///
    /// Fails if the master key has the wrong size, if the wrapped bytes do
    /// not authenticate, or if they do not unwrap to an AES-256 key.
    pub fn unseal(&self, data_key: &DataKey) -> Result<DataKey, VaultError> {
        let plaintext = Zeroizing::new(
            crypto::unseal(&self.bytes, data_key.key_bytes()).context("unwrap data key")?,
        );
        if !model::is_data_key_len(&plaintext) {
            return Err(VaultError::InvalidKey).context("unwrap data key");
        }
        Ok(data_key.with_key(plaintext.to_vec()))
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey([REDACTED])")
    }
}
