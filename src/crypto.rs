//! Low-level cryptographic operations.
//!
//! This module is the only place in the crate that imports `ring`. Every
//! other module seals and unseals exclusively through the functions exposed
//! here.
//!
//! Primitive choices:
//! - **Cipher**: AES-GCM (authenticated encryption), AES-256 for every key the
//!   vault generates; 128-bit keys are accepted as the other valid size.
//! - **Nonce**: 96-bit (12 bytes), generated fresh per operation via `SystemRandom`
//! - **Layout**: `[ nonce ][ ciphertext + GCM tag ]`, one buffer, no separate IV

use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey, AES_128_GCM, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::VaultError;

/// Size of the nonce in bytes (96 bits).
pub const NONCE_LEN: usize = aead::NONCE_LEN;

/// Size of the GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Size of a master or data key in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// Pick the AEAD algorithm matching the key length.
///
/// The key length is checked before anything else, so a bad key is always
/// reported as `InvalidKey`, whatever the state of the input buffer.
fn algorithm_for(key: &[u8]) -> Result<&'static aead::Algorithm, VaultError> {
    match key.len() {
        16 => Ok(&AES_128_GCM),
        32 => Ok(&AES_256_GCM),
        _ => Err(VaultError::InvalidKey),
    }
}

fn less_safe_key(key: &[u8]) -> Result<LessSafeKey, VaultError> {
    let unbound =
        UnboundKey::new(algorithm_for(key)?, key).map_err(|_| VaultError::InvalidKey)?;
    Ok(LessSafeKey::new(unbound))
}

/// Fill `buf` from the system CSPRNG.
fn fill_random(buf: &mut [u8]) -> Result<(), VaultError> {
    SystemRandom::new()
        .fill(buf)
        .map_err(|_| VaultError::RandomnessFailure)
}

/// Seal a plaintext buffer with AES-GCM.
///
/// Returns the nonce prepended to the ciphertext and tag:
/// ```text
/// [ nonce (12 bytes) ][ ciphertext ][ GCM tag (16 bytes) ]
/// ```
/// A zero-length plaintext is valid and yields a 28-byte output.
pub fn seal(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, VaultError> {
    let key = less_safe_key(key)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    fill_random(&mut nonce_bytes)?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out = plaintext.to_vec();
    key.seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| VaultError::EncryptionFailure)?;

    let mut output = Vec::with_capacity(NONCE_LEN + in_out.len());
    output.extend_from_slice(&nonce_bytes);
    output.extend_from_slice(&in_out);
    Ok(output)
}

/// Unseal a buffer produced by [`seal`].
///
/// Truncated input, a wrong key or any tampering fails the GCM check and
/// returns `DecryptionFailure`. The caller never receives partial plaintext.
pub fn unseal(key: &[u8], sealed: &[u8]) -> Result<Vec<u8>, VaultError> {
    let key = less_safe_key(key)?;

    if sealed.len() < NONCE_LEN + TAG_LEN {
        return Err(VaultError::DecryptionFailure);
    }
    let (nonce_bytes, payload) = sealed.split_at(NONCE_LEN);
    let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
        .map_err(|_| VaultError::DecryptionFailure)?;

    let mut in_out = payload.to_vec();
    let plaintext = key
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| VaultError::DecryptionFailure)?;

    Ok(plaintext.to_vec())
}

/// Generate a cryptographically secure random 256-bit key.
///
/// The only source of fresh key material in the crate: used for new data keys
/// and by [`crate::generate_master_key`].
pub fn generate_random_key() -> Result<[u8; KEY_LEN], VaultError> {
    let mut key = [0u8; KEY_LEN];
    fill_random(&mut key)?;
    Ok(key)
}
