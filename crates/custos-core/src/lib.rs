//! Custos Core - shared types, threshold secret sharing, and shard sealing
//!
//! This crate provides the foundational pieces of the Custos key custody
//! system: the wallet address and shard types, secp256k1 key handling with
//! Ethereum-style address derivation, a K-of-N secret splitter over
//! GF(256), and authenticated envelope encryption for the one shard the
//! server persists.

pub mod error;
pub mod keys;
pub mod sealed;
pub mod shamir;
pub mod types;

pub use error::{CoreError, Result};
pub use keys::{derive_address, generate_keypair, keccak256, secret_from_hex, secret_to_hex};
pub use sealed::MasterKey;
pub use shamir::{combine, split};
pub use types::{Shard, WalletAddress};

/// Number of shards produced for each custody split
pub const SHARD_COUNT: u8 = 3;

/// Number of shards required to reconstruct a key
pub const SHARD_THRESHOLD: u8 = 2;

/// Length of a hex-encoded secp256k1 private key with no prefix
pub const SECRET_HEX_LEN: usize = 64;
