//! Custos Wallet - threshold key custody engine and signing services
//!
//! Wallet private keys never rest anywhere in one piece. On creation the
//! key is split 2-of-3; the server seals and keeps shard #1, the caller
//! walks away with shards #2 and #3. Signing reconstructs the key from the
//! sealed shard plus one caller shard, verifies it against the wallet
//! address, produces the signature, and discards the key again.
//!
//! Every persistence call is routed through the `custos-gateway` circuit
//! breaker.

pub mod config;
pub mod engine;
pub mod error;
pub mod handle;
pub mod password;
pub mod signing;
pub mod store;

pub use config::{CustodyConfig, MASTER_KEY_ENV};
pub use engine::{CreatedWallet, CustodyEngine, NewWallet};
pub use error::{CustodyError, Result};
pub use handle::RecoveredKeyHandle;
pub use password::{Argon2PasswordHasher, PasswordHasher};
pub use signing::eip712::{Eip712Domain, TypedData, TypedDataError, TypedDataField};
pub use store::{BackupShardRecord, MemoryWalletStore, StoreError, WalletRecord, WalletStore};
