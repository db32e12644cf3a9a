//! Gateway behavior as seen from the custody engine
//!
//! Persistence failures must surface as the generic "temporarily
//! unavailable" error, and a consistently slow store must trip the
//! breaker so later calls fail fast without touching it.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use custos_core::MasterKey;
use custos_gateway::{CircuitState, GatewaySettings, ResilientGateway};
use custos_wallet::{
    engine::ops, Argon2PasswordHasher, BackupShardRecord, CustodyConfig, CustodyEngine,
    CustodyError, MemoryWalletStore, NewWallet, StoreError, WalletRecord, WalletStore,
};

/// Store whose writes can be slowed down at runtime
struct LaggyStore {
    inner: MemoryWalletStore,
    slow: AtomicBool,
    insert_calls: AtomicU32,
    inserts_landed: AtomicU32,
}

impl LaggyStore {
    fn new() -> Self {
        Self {
            inner: MemoryWalletStore::new(),
            slow: AtomicBool::new(true),
            insert_calls: AtomicU32::new(0),
            inserts_landed: AtomicU32::new(0),
        }
    }

    async fn stall(&self) {
        if self.slow.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }
}

#[async_trait]
impl WalletStore for LaggyStore {
    async fn insert_wallet(
        &self,
        record: WalletRecord,
        backup: Option<BackupShardRecord>,
    ) -> Result<(), StoreError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        self.stall().await;
        let result = self.inner.insert_wallet(record, backup).await;
        if result.is_ok() {
            self.inserts_landed.fetch_add(1, Ordering::SeqCst);
        }
        result
    }

    async fn select_wallet(&self, address: &str) -> Result<WalletRecord, StoreError> {
        self.stall().await;
        self.inner.select_wallet(address).await
    }

    async fn update_password(
        &self,
        address: &str,
        password_hash: String,
    ) -> Result<(), StoreError> {
        self.stall().await;
        self.inner.update_password(address, password_hash).await
    }

    async fn deactivate(
        &self,
        address: &str,
        replacement_email: String,
        replacement_name: String,
    ) -> Result<(), StoreError> {
        self.stall().await;
        self.inner
            .deactivate(address, replacement_email, replacement_name)
            .await
    }
}

fn new_wallet(email: &str) -> NewWallet {
    NewWallet {
        email: email.to_string(),
        password: "pw".to_string(),
        name: "A".to_string(),
    }
}

fn tight_settings() -> GatewaySettings {
    // The sleep window stays wide relative to the password-hashing work a
    // wallet creation does before it reaches the gateway, so the breaker
    // cannot slip into half-open between the calls below
    GatewaySettings::default()
        .with_timeout(Duration::from_millis(50))
        .with_request_volume_threshold(5)
        .with_sleep_window(Duration::from_secs(3))
}

#[tokio::test]
async fn test_slow_store_trips_breaker_then_recovers() {
    let store = Arc::new(LaggyStore::new());
    let gateway = Arc::new(
        ResilientGateway::default().with_operation(ops::INSERT_WALLET, tight_settings()),
    );

    let store_dyn: Arc<dyn WalletStore> = store.clone();
    let engine = CustodyEngine::new(
        store_dyn,
        Arc::clone(&gateway),
        Arc::new(Argon2PasswordHasher),
        CustodyConfig::new(MasterKey::generate()),
    );

    // Five consecutive timeouts open the circuit
    for i in 0..5 {
        let err = engine
            .create_wallet(new_wallet(&format!("u{}@x.com", i)))
            .await
            .unwrap_err();
        assert!(matches!(err, CustodyError::Unavailable(_)), "call {}", i);
    }
    assert_eq!(
        gateway.breaker(ops::INSERT_WALLET).state(),
        CircuitState::Open
    );
    assert_eq!(store.insert_calls.load(Ordering::SeqCst), 5);

    // The sixth call fails fast without reaching the store
    let err = engine
        .create_wallet(new_wallet("u6@x.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, CustodyError::Unavailable(_)));
    assert_eq!(store.insert_calls.load(Ordering::SeqCst), 5);

    // Dependency recovers; after the cooldown the trial call closes the
    // circuit and normal service resumes
    store.slow.store(false, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(3200)).await;

    let created = engine.create_wallet(new_wallet("u7@x.com")).await.unwrap();
    assert!(created.wallet_address.starts_with("0x"));
    assert_eq!(
        gateway.breaker(ops::INSERT_WALLET).state(),
        CircuitState::Closed
    );

    let created = engine.create_wallet(new_wallet("u8@x.com")).await.unwrap();
    assert!(created.wallet_address.starts_with("0x"));
}

#[tokio::test]
async fn test_timed_out_write_may_still_land() {
    // A timeout is reported to the caller, but the in-flight write is not
    // cancelled at the source; the engine must treat it as abandoned
    let store = Arc::new(LaggyStore::new());
    let gateway = Arc::new(
        ResilientGateway::default().with_operation(ops::INSERT_WALLET, tight_settings()),
    );

    let store_dyn: Arc<dyn WalletStore> = store.clone();
    let engine = CustodyEngine::new(
        store_dyn,
        gateway,
        Arc::new(Argon2PasswordHasher),
        CustodyConfig::new(MasterKey::generate()),
    );

    let err = engine.create_wallet(new_wallet("a@x.com")).await.unwrap_err();
    assert!(matches!(err, CustodyError::Unavailable(_)));
    assert_eq!(store.inserts_landed.load(Ordering::SeqCst), 0);

    // The background write completes after the deadline; the caller
    // already saw the timeout and never observes this result
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(store.inserts_landed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_domain_errors_bypass_unavailable_mapping() {
    let store = Arc::new(MemoryWalletStore::new());
    let store_dyn: Arc<dyn WalletStore> = store;
    let engine = CustodyEngine::new(
        store_dyn,
        Arc::new(ResilientGateway::default()),
        Arc::new(Argon2PasswordHasher),
        CustodyConfig::new(MasterKey::generate()),
    );

    // A missing row is a domain error, not a transient one
    let err = engine
        .update_password("0xmissing", "pw")
        .await
        .unwrap_err();
    assert!(matches!(err, CustodyError::MissingRecord(_)));
}
