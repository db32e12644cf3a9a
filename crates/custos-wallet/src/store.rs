//! Wallet persistence contract and the in-memory reference store

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

/// Persisted identity record, keyed by wallet address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletRecord {
    pub wallet_address: String,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub encrypted_custody_shard: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Server-side copy of the backup shard, written only when the policy
/// enables it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupShardRecord {
    pub wallet_address: String,
    pub backup_shard_value: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Missing record: {0}")]
    Missing(String),

    #[error("Database error: {0}")]
    Database(String),
}

/// Persistence operations the custody engine depends on.
///
/// `insert_wallet` must write the identity row, its custody shard, and the
/// optional backup record as one all-or-nothing unit; on any failure no
/// part of the wallet may remain persisted.
#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn insert_wallet(
        &self,
        record: WalletRecord,
        backup: Option<BackupShardRecord>,
    ) -> Result<(), StoreError>;

    async fn select_wallet(&self, address: &str) -> Result<WalletRecord, StoreError>;

    async fn update_password(&self, address: &str, password_hash: String)
        -> Result<(), StoreError>;

    /// Scrub the identity fields of a wallet, releasing its email slot
    async fn deactivate(
        &self,
        address: &str,
        replacement_email: String,
        replacement_name: String,
    ) -> Result<(), StoreError>;
}

/// Process-local store backing tests and local development
#[derive(Default)]
pub struct MemoryWalletStore {
    inner: RwLock<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    wallets: HashMap<String, WalletRecord>,
    backups: HashMap<String, BackupShardRecord>,
}

impl MemoryWalletStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored backup shard record, if the policy persisted one
    pub async fn backup_shard(&self, address: &str) -> Option<BackupShardRecord> {
        self.inner.read().await.backups.get(address).cloned()
    }
}

#[async_trait]
impl WalletStore for MemoryWalletStore {
    async fn insert_wallet(
        &self,
        record: WalletRecord,
        backup: Option<BackupShardRecord>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;

        if inner.wallets.contains_key(&record.wallet_address) {
            return Err(StoreError::Duplicate(record.wallet_address));
        }
        if inner.wallets.values().any(|w| w.email == record.email) {
            return Err(StoreError::Duplicate("email already registered".to_string()));
        }

        if let Some(backup) = backup {
            inner.backups.insert(backup.wallet_address.clone(), backup);
        }
        inner.wallets.insert(record.wallet_address.clone(), record);
        Ok(())
    }

    async fn select_wallet(&self, address: &str) -> Result<WalletRecord, StoreError> {
        self.inner
            .read()
            .await
            .wallets
            .get(address)
            .cloned()
            .ok_or_else(|| StoreError::Missing(address.to_string()))
    }

    async fn update_password(
        &self,
        address: &str,
        password_hash: String,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let record = inner
            .wallets
            .get_mut(address)
            .ok_or_else(|| StoreError::Missing(address.to_string()))?;
        record.password_hash = password_hash;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn deactivate(
        &self,
        address: &str,
        replacement_email: String,
        replacement_name: String,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let record = inner
            .wallets
            .get_mut(address)
            .ok_or_else(|| StoreError::Missing(address.to_string()))?;
        record.email = replacement_email;
        record.name = replacement_name;
        record.password_hash = String::new();
        record.encrypted_custody_shard = String::new();
        record.updated_at = Utc::now();
        Ok(())
    }
}
