//! Core newtypes: wallet addresses and secret shards

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CoreError, Result};
use crate::keys::keccak256;

use base64::Engine;

/// Wallet address (20 bytes, derived from the account public key)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WalletAddress(pub [u8; 20]);

impl WalletAddress {
    /// Create a new WalletAddress from raw bytes
    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Render with EIP-55 mixed-case checksum and `0x` prefix
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let digest = keccak256(lower.as_bytes());

        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = if i % 2 == 0 {
                digest[i / 2] >> 4
            } else {
                digest[i / 2] & 0x0f
            };
            if nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }

    /// Parse from a hex string, with or without `0x` prefix, any casing
    pub fn from_hex(s: &str) -> Result<Self> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        if stripped.len() != 40 {
            return Err(CoreError::InvalidAddress(format!(
                "expected 40 hex chars, got {}",
                stripped.len()
            )));
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(stripped.to_ascii_lowercase(), &mut bytes)
            .map_err(|e| CoreError::InvalidAddress(e.to_string()))?;
        Ok(Self(bytes))
    }
}

impl std::fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_checksum())
    }
}

impl AsRef<[u8]> for WalletAddress {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for WalletAddress {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for WalletAddress {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        WalletAddress::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// One piece of a threshold-split secret.
///
/// The payload is the per-byte polynomial evaluations followed by the
/// shard's x-coordinate as the trailing byte. Shards are transported as
/// base64 and never logged; the buffer is zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Shard(Vec<u8>);

impl Shard {
    /// Wrap raw shard bytes
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Shard length in bytes (secret length + 1)
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The shard's x-coordinate (trailing byte), if present
    pub fn index(&self) -> Option<u8> {
        self.0.last().copied()
    }

    /// Encode for transport
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.0)
    }

    /// Decode from transport encoding
    pub fn from_base64(s: &str) -> Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(s)
            .map_err(|e| CoreError::ShareCorrupt(format!("base64 decode failed: {}", e)))?;
        Ok(Self(bytes))
    }
}

impl std::fmt::Debug for Shard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Shard([REDACTED]; {} bytes)", self.0.len())
    }
}

impl AsRef<[u8]> for Shard {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
