//! Signature production from reconstructed keys
//!
//! Both schemes consume the [`RecoveredKeyHandle`] by value: one
//! reconstruction backs exactly one signature, and the key material is
//! zeroized when the handle drops at the end of the call.
//!
//! [`RecoveredKeyHandle`]: crate::handle::RecoveredKeyHandle

pub mod eip191;
pub mod eip712;

use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};

use custos_core::{derive_address, WalletAddress};

use crate::error::{CustodyError, Result};

/// Recovery id offset in the trailing signature byte
const V_OFFSET: u8 = 27;

/// Sign a 32-byte digest, returning `0x || r || s || v` hex
pub(crate) fn sign_digest(key: &SigningKey, digest: &[u8; 32]) -> Result<String> {
    let (signature, recovery_id) = key
        .sign_prehash_recoverable(digest)
        .map_err(|e| CustodyError::Signing(e.to_string()))?;

    let mut bytes = [0u8; 65];
    bytes[..64].copy_from_slice(&signature.to_bytes());
    bytes[64] = V_OFFSET + recovery_id.to_byte();
    Ok(format!("0x{}", hex::encode(bytes)))
}

/// Recover the signer address from a digest and a `0x || r || s || v`
/// signature
pub fn recover_address(digest: &[u8; 32], signature_hex: &str) -> Result<WalletAddress> {
    let stripped = signature_hex.strip_prefix("0x").unwrap_or(signature_hex);
    let mut bytes = [0u8; 65];
    hex::decode_to_slice(stripped, &mut bytes)
        .map_err(|e| CustodyError::Signing(format!("signature decode failed: {}", e)))?;

    let signature = EcdsaSignature::from_slice(&bytes[..64])
        .map_err(|e| CustodyError::Signing(e.to_string()))?;
    let recovery_id = RecoveryId::from_byte(bytes[64].wrapping_sub(V_OFFSET))
        .ok_or_else(|| CustodyError::Signing("invalid recovery id".to_string()))?;

    let verifying_key = VerifyingKey::recover_from_prehash(digest, &signature, recovery_id)
        .map_err(|e| CustodyError::Signing(e.to_string()))?;

    Ok(derive_address(&verifying_key)?)
}
