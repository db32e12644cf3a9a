//! Envelope encryption for the persisted custody shard
//!
//! The one shard the server keeps is sealed with ChaCha20-Poly1305 under
//! the process master key. A fresh random 96-bit nonce is generated per
//! call and prepended to the ciphertext; the whole blob crosses storage
//! as base64.

use base64::Engine;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CoreError, Result};
use crate::types::Shard;

/// Nonce length for ChaCha20-Poly1305 (96 bits)
pub const NONCE_LEN: usize = 12;

/// Process-wide shard encryption key (32 bytes).
///
/// Loaded once at startup from configuration; never derived from a shard
/// or from user input. Zeroized on drop and redacted in debug output.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; 32]);

impl MasterKey {
    /// Wrap raw key bytes
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse from 64 hex characters
    pub fn from_hex(s: &str) -> Result<Self> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s.trim(), &mut bytes)
            .map_err(|e| CoreError::InvalidMasterKey(e.to_string()))?;
        Ok(Self(bytes))
    }

    /// Generate a random key (for tests and provisioning tooling)
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MasterKey([REDACTED])")
    }
}

/// Seal a plaintext shard under the master key
pub fn seal(shard: &Shard, key: &MasterKey) -> Result<String> {
    let cipher = ChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|_| CoreError::EncryptionFailed)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from(nonce_bytes);

    let ciphertext = cipher
        .encrypt(&nonce, shard.as_bytes())
        .map_err(|_| CoreError::EncryptionFailed)?;

    let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);
    Ok(base64::engine::general_purpose::STANDARD.encode(blob))
}

/// Open a sealed blob back into the plaintext shard.
///
/// Bad base64, truncation, tag mismatch, and wrong key all surface as the
/// same `DecryptionFailed`.
pub fn open(blob: &str, key: &MasterKey) -> Result<Shard> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(blob)
        .map_err(|_| CoreError::DecryptionFailed)?;

    if bytes.len() <= NONCE_LEN {
        return Err(CoreError::DecryptionFailed);
    }
    let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_LEN);

    let cipher = ChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|_| CoreError::DecryptionFailed)?;

    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| CoreError::DecryptionFailed)?;

    Ok(Shard::new(plaintext))
}
