//! Error types for the Custos core library

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Fewer shards than the reconstruction threshold were supplied
    #[error("Share count insufficient: need {needed}, got {got}")]
    ShareCountInsufficient { needed: usize, got: usize },

    /// A shard encoding is malformed (bad base64, bad length, bad x-coordinate)
    #[error("Share corrupt: {0}")]
    ShareCorrupt(String),

    /// Split parameters outside 2 <= k <= n
    #[error("Invalid threshold: {threshold} of {count}")]
    InvalidThreshold { threshold: u8, count: u8 },

    /// Sealing the shard failed
    #[error("Encryption failed")]
    EncryptionFailed,

    /// Covers authentication failure, truncated input, and wrong key alike;
    /// callers must not be able to tell these apart
    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Invalid master key: {0}")]
    InvalidMasterKey(String),

    #[error("Invalid private key")]
    InvalidPrivateKey,

    #[error("Invalid public key")]
    InvalidPublicKey,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}
