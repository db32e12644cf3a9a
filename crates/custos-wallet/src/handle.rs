//! Ephemeral reconstructed key handle

use k256::ecdsa::{SigningKey, VerifyingKey};

use custos_core::WalletAddress;

/// Private key recovered for the duration of a single signing call.
///
/// The handle is not cloneable, not serializable, and redacted in debug
/// output; signing consumes it by value so a reconstruction can back at
/// most one operation. The inner key material is zeroized when the handle
/// drops.
pub struct RecoveredKeyHandle {
    signing_key: SigningKey,
    address: WalletAddress,
}

impl RecoveredKeyHandle {
    pub(crate) fn new(signing_key: SigningKey, address: WalletAddress) -> Self {
        Self {
            signing_key,
            address,
        }
    }

    /// Address re-derived from the reconstructed key
    pub fn address(&self) -> &WalletAddress {
        &self.address
    }

    /// Public half of the reconstructed key
    pub fn verifying_key(&self) -> VerifyingKey {
        *self.signing_key.verifying_key()
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}

impl std::fmt::Debug for RecoveredKeyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RecoveredKeyHandle({}, [REDACTED])", self.address)
    }
}
