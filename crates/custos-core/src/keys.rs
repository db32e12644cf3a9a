//! secp256k1 key handling and address derivation

use k256::ecdsa::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use sha3::{Digest, Keccak256};
use zeroize::Zeroizing;

use crate::error::{CoreError, Result};
use crate::types::WalletAddress;
use crate::SECRET_HEX_LEN;

/// Hash data using Keccak-256
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Generate a fresh secp256k1 keypair
pub fn generate_keypair() -> SigningKey {
    SigningKey::random(&mut OsRng)
}

/// Derive the wallet address: last 20 bytes of Keccak-256 over the
/// uncompressed public point (without the 0x04 tag byte)
pub fn derive_address(key: &VerifyingKey) -> Result<WalletAddress> {
    let point = key.to_encoded_point(false);
    let bytes = point.as_bytes();
    if bytes.len() != 65 {
        return Err(CoreError::InvalidPublicKey);
    }

    let digest = keccak256(&bytes[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&digest[12..]);
    Ok(WalletAddress::new(address))
}

/// Hex-encode a private key with no prefix (64 chars)
pub fn secret_to_hex(key: &SigningKey) -> Zeroizing<String> {
    Zeroizing::new(hex::encode(key.to_bytes()))
}

/// Parse a 64-hex-char private key back into a signing key
pub fn secret_from_hex(hex_secret: &[u8]) -> Result<SigningKey> {
    if hex_secret.len() != SECRET_HEX_LEN {
        return Err(CoreError::InvalidPrivateKey);
    }

    let mut bytes = Zeroizing::new([0u8; 32]);
    hex::decode_to_slice(hex_secret, bytes.as_mut())
        .map_err(|_| CoreError::InvalidPrivateKey)?;

    SigningKey::from_slice(bytes.as_ref()).map_err(|_| CoreError::InvalidPrivateKey)
}
