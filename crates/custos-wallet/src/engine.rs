//! Wallet creation, key reconstruction, and signing orchestration

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use custos_core::{keys, sealed, shamir, Shard, SHARD_COUNT, SHARD_THRESHOLD};
use custos_gateway::ResilientGateway;

use crate::config::CustodyConfig;
use crate::error::{CustodyError, Result};
use crate::handle::RecoveredKeyHandle;
use crate::password::PasswordHasher;
use crate::signing::{eip191, eip712, eip712::TypedData};
use crate::store::{BackupShardRecord, WalletRecord, WalletStore};

/// Operation names registered with the gateway
pub mod ops {
    pub const INSERT_WALLET: &str = "insert_wallet";
    pub const SELECT_WALLET: &str = "select_wallet";
    pub const UPDATE_WALLET_PASSWORD: &str = "update_wallet_password";
    pub const DEACTIVATE_WALLET: &str = "deactivate_wallet";
}

/// Request to create a wallet-backed identity
#[derive(Clone)]
pub struct NewWallet {
    pub email: String,
    pub password: String,
    pub name: String,
}

impl std::fmt::Debug for NewWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewWallet")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("name", &self.name)
            .finish()
    }
}

/// Result of wallet creation. The two shards are returned exactly once and
/// are never retrievable again.
#[derive(Debug)]
pub struct CreatedWallet {
    pub wallet_address: String,
    /// Shard #2, for client/device storage (base64)
    pub device_shard: String,
    /// Shard #3, for out-of-band backup (base64)
    pub backup_shard: String,
}

/// Orchestrates the custody flow: split on creation, combine on use.
///
/// All collaborators are injected at construction; the engine holds no
/// global state and no plaintext key material between calls.
pub struct CustodyEngine {
    store: Arc<dyn WalletStore>,
    gateway: Arc<ResilientGateway>,
    hasher: Arc<dyn PasswordHasher>,
    config: CustodyConfig,
}

impl CustodyEngine {
    pub fn new(
        store: Arc<dyn WalletStore>,
        gateway: Arc<ResilientGateway>,
        hasher: Arc<dyn PasswordHasher>,
        config: CustodyConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            hasher,
            config,
        }
    }

    /// Create a wallet: generate a keypair, split the secret 2-of-3, seal
    /// shard #1 into the identity record, and hand shards #2 and #3 back to
    /// the caller.
    pub async fn create_wallet(&self, request: NewWallet) -> Result<CreatedWallet> {
        let signing_key = keys::generate_keypair();
        let address = keys::derive_address(signing_key.verifying_key())?;
        let wallet_address = address.to_checksum();

        let secret_hex = keys::secret_to_hex(&signing_key);
        let shards = shamir::split(secret_hex.as_bytes(), SHARD_COUNT, SHARD_THRESHOLD)?;
        let sealed_custody_shard = sealed::seal(&shards[0], &self.config.master_key)?;
        let device_shard = shards[1].to_base64();
        let backup_shard = shards[2].to_base64();

        let password_hash = self.hasher.hash(&request.password)?;
        let now = Utc::now();
        let record = WalletRecord {
            wallet_address: wallet_address.clone(),
            email: request.email,
            password_hash,
            name: request.name,
            encrypted_custody_shard: sealed_custody_shard,
            created_at: now,
            updated_at: now,
        };

        let backup_record = if self.config.persist_backup_shard {
            warn!(
                wallet = %wallet_address,
                "persisting backup shard server-side; two of three shards now share one trust domain"
            );
            Some(BackupShardRecord {
                wallet_address: wallet_address.clone(),
                backup_shard_value: backup_shard.clone(),
                created_at: now,
            })
        } else {
            None
        };

        let store = Arc::clone(&self.store);
        self.gateway
            .execute(ops::INSERT_WALLET, move || async move {
                store.insert_wallet(record, backup_record).await
            })
            .await
            .map_err(CustodyError::from_gateway)?;

        info!(wallet = %wallet_address, "wallet created");
        Ok(CreatedWallet {
            wallet_address,
            device_shard,
            backup_shard,
        })
    }

    /// Rebuild the private key from the sealed custody shard and the
    /// caller's shard, verify it against the wallet address, and hand back
    /// an ephemeral handle.
    pub async fn reconstruct_key(
        &self,
        address: &str,
        caller_shard: &str,
    ) -> Result<RecoveredKeyHandle> {
        let record = self.fetch_wallet(address).await?;

        let custody_shard = sealed::open(&record.encrypted_custody_shard, &self.config.master_key)?;
        let supplied_shard = Shard::from_base64(caller_shard)?;
        let secret_hex = shamir::combine(&[custody_shard, supplied_shard], SHARD_THRESHOLD)?;

        let signing_key =
            keys::secret_from_hex(&secret_hex).map_err(|_| CustodyError::InvalidUserPrivateKey)?;
        let derived = keys::derive_address(signing_key.verifying_key())
            .map_err(|_| CustodyError::InvalidUserPublicKey)?;

        if derived.to_checksum() != record.wallet_address {
            // The only integrity check against a forged or mismatched
            // caller shard; combine alone cannot detect one
            warn!(wallet = %record.wallet_address, "reconstructed key does not match wallet");
            return Err(CustodyError::UnauthorizedAccess);
        }

        debug!(wallet = %record.wallet_address, "key reconstructed");
        Ok(RecoveredKeyHandle::new(signing_key, derived))
    }

    /// Reconstruct and sign a personal message (EIP-191)
    pub async fn sign_personal_message(
        &self,
        address: &str,
        caller_shard: &str,
        message: &[u8],
    ) -> Result<String> {
        let handle = self.reconstruct_key(address, caller_shard).await?;
        eip191::sign_personal_message(handle, message)
    }

    /// Reconstruct and sign a typed-data payload (EIP-712)
    pub async fn sign_typed_data(
        &self,
        address: &str,
        caller_shard: &str,
        typed: &TypedData,
    ) -> Result<String> {
        let handle = self.reconstruct_key(address, caller_shard).await?;
        eip712::sign_typed_data(handle, typed)
    }

    /// Verification-only path: reconstruct and return the derived address
    pub async fn reconstruct_address(&self, address: &str, caller_shard: &str) -> Result<String> {
        let handle = self.reconstruct_key(address, caller_shard).await?;
        Ok(handle.address().to_checksum())
    }

    /// Re-hash and persist a new password
    pub async fn update_password(&self, address: &str, new_password: &str) -> Result<()> {
        let password_hash = self.hasher.hash(new_password)?;

        let store = Arc::clone(&self.store);
        let address = address.to_string();
        self.gateway
            .execute(ops::UPDATE_WALLET_PASSWORD, move || async move {
                store.update_password(&address, password_hash).await
            })
            .await
            .map_err(CustodyError::from_gateway)
    }

    /// Scrub a wallet's identity fields and release its email slot
    pub async fn deactivate_wallet(&self, address: &str) -> Result<()> {
        let store = Arc::clone(&self.store);
        let address = address.to_string();
        let replacement_email = format!("{}@deactivated.wallet", address);
        self.gateway
            .execute(ops::DEACTIVATE_WALLET, move || async move {
                store
                    .deactivate(&address, replacement_email, "Deactivated Wallet".to_string())
                    .await
            })
            .await
            .map_err(CustodyError::from_gateway)?;

        info!("wallet deactivated");
        Ok(())
    }

    async fn fetch_wallet(&self, address: &str) -> Result<WalletRecord> {
        let store = Arc::clone(&self.store);
        let address = address.to_string();
        self.gateway
            .execute(ops::SELECT_WALLET, move || async move {
                store.select_wallet(&address).await
            })
            .await
            .map_err(CustodyError::from_gateway)
    }
}
