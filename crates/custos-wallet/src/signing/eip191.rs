//! Personal-message signing (EIP-191)

use custos_core::keccak256;

use super::sign_digest;
use crate::error::Result;
use crate::handle::RecoveredKeyHandle;

/// Prefix applied to personal messages before hashing
const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// Domain-separated digest of a personal message
pub fn personal_message_digest(message: &[u8]) -> [u8; 32] {
    let length = message.len().to_string();
    let mut data = Vec::with_capacity(PERSONAL_MESSAGE_PREFIX.len() + length.len() + message.len());
    data.extend_from_slice(PERSONAL_MESSAGE_PREFIX.as_bytes());
    data.extend_from_slice(length.as_bytes());
    data.extend_from_slice(message);
    keccak256(&data)
}

/// Sign a personal message with a reconstructed key, consuming the handle
pub fn sign_personal_message(handle: RecoveredKeyHandle, message: &[u8]) -> Result<String> {
    let digest = personal_message_digest(message);
    sign_digest(handle.signing_key(), &digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::recover_address;
    use custos_core::keys;

    #[test]
    fn test_digest_includes_length_prefix() {
        // Same bytes, different framing, different digests
        assert_ne!(
            personal_message_digest(b"abc"),
            personal_message_digest(b"abcd")
        );
        assert_ne!(personal_message_digest(b""), personal_message_digest(b"a"));
    }

    #[test]
    fn test_signature_recovers_to_wallet() {
        let key = keys::generate_keypair();
        let address = keys::derive_address(key.verifying_key()).unwrap();
        let handle = RecoveredKeyHandle::new(key, address);

        let message = b"hello custos";
        let signature = sign_personal_message(handle, message).unwrap();

        let digest = personal_message_digest(message);
        let recovered = recover_address(&digest, &signature).unwrap();
        assert_eq!(recovered, address);
    }

    #[test]
    fn test_distinct_messages_distinct_signatures() {
        let key = keys::generate_keypair();
        let address = keys::derive_address(key.verifying_key()).unwrap();

        let sig_a =
            sign_personal_message(RecoveredKeyHandle::new(key.clone(), address), b"a").unwrap();
        let sig_b = sign_personal_message(RecoveredKeyHandle::new(key, address), b"b").unwrap();
        assert_ne!(sig_a, sig_b);
    }
}
