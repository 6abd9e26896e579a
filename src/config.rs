//! Vault configuration: the master key and the rotation policy.
//!
//! The master key has no default and is never compiled in. It is held as a
//! `SecretString`, so it is redacted from `Debug` output and zeroised on drop.

use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::KEY_LEN;
use crate::error::VaultError;
use crate::keys::MasterKey;

/// Default bytes sealed under one data key before it is rotated out (1 MiB).
pub const DEFAULT_ENCRYPTED_DATA_SIZE_THRESHOLD: u64 = 1024 * 1024;

/// Default seal operations under one data key before it is rotated out.
pub const DEFAULT_ENCRYPTIONS_COUNT_THRESHOLD: u64 = 1000;

pub const ENV_MASTER_KEY: &str = "ENVAULT_MASTER_KEY";
pub const ENV_SIZE_THRESHOLD: &str = "ENVAULT_ROTATION_SIZE_THRESHOLD";
pub const ENV_COUNT_THRESHOLD: &str = "ENVAULT_ROTATION_COUNT_THRESHOLD";

/// When the active data key is retired.
///
/// A key is rotated out on the first seal that finds *either* counter at or
/// above its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationPolicy {
    pub encrypted_data_size_threshold: u64,
    pub encryptions_count_threshold: u64,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            encrypted_data_size_threshold: DEFAULT_ENCRYPTED_DATA_SIZE_THRESHOLD,
            encryptions_count_threshold: DEFAULT_ENCRYPTIONS_COUNT_THRESHOLD,
        }
    }
}

impl RotationPolicy {
    /// Reject thresholds of zero, which would rotate on every seal.
    pub fn validate(&self) -> Result<(), VaultError> {
        if self.encrypted_data_size_threshold == 0 {
            return Err(VaultError::InvalidConfig(
                "encrypted_data_size_threshold must be positive".into(),
            ));
        }
        if self.encryptions_count_threshold == 0 {
            return Err(VaultError::InvalidConfig(
                "encryptions_count_threshold must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Top-level vault configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct VaultConfig {
    /// Base64 encoding of the 32-byte master key.
    pub master_key: SecretString,
    #[serde(default)]
    pub rotation: RotationPolicy,
}

impl VaultConfig {
    /// Configuration with the default rotation policy.
    pub fn new(master_key: SecretString) -> Self {
        Self {
            master_key,
            rotation: RotationPolicy::default(),
        }
    }

    /// Parse a JSON document such as
    /// `{"master_key": "...", "rotation": {"encryptions_count_threshold": 500}}`.
    pub fn from_json_str(raw: &str) -> Result<Self, VaultError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| VaultError::InvalidConfig(e.to_string()))?;
        config.rotation.validate()?;
        Ok(config)
    }

    /// Read `ENVAULT_*` variables from the process environment.
    pub fn from_env() -> Result<Self, VaultError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Unset thresholds keep their
    /// defaults; an unset master key is an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, VaultError> {
        let master_key = lookup(ENV_MASTER_KEY)
            .ok_or_else(|| VaultError::InvalidConfig(format!("{ENV_MASTER_KEY} is not set")))?;

        let mut rotation = RotationPolicy::default();
        if let Some(raw) = lookup(ENV_SIZE_THRESHOLD) {
            rotation.encrypted_data_size_threshold = parse_threshold(ENV_SIZE_THRESHOLD, &raw)?;
        }
        if let Some(raw) = lookup(ENV_COUNT_THRESHOLD) {
            rotation.encryptions_count_threshold = parse_threshold(ENV_COUNT_THRESHOLD, &raw)?;
        }
        rotation.validate()?;

        Ok(Self {
            master_key: SecretString::new(master_key),
            rotation,
        })
    }

    /// Decode the configured master key. It must be exactly 32 bytes.
    pub fn master_key(&self) -> Result<MasterKey, VaultError> {
        let bytes = Zeroizing::new(
            base64::engine::general_purpose::STANDARD
                .decode(self.master_key.expose_secret().trim())
                .map_err(|_| VaultError::InvalidConfig("master_key is not valid base64".into()))?,
        );
        if bytes.len() != KEY_LEN {
            return Err(VaultError::InvalidKey);
        }
        Ok(MasterKey::from_bytes(bytes.to_vec()))
    }
}

fn parse_threshold(name: &str, raw: &str) -> Result<u64, VaultError> {
    raw.trim()
        .parse()
        .map_err(|_| VaultError::InvalidConfig(format!("{name} must be a non-negative integer")))
}
