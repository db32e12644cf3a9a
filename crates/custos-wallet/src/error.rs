//! Error types surfaced at the custody boundary

use thiserror::Error;

use custos_core::CoreError;
use custos_gateway::GatewayError;

use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, CustodyError>;

#[derive(Debug, Error)]
pub enum CustodyError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Duplicate record: {0}")]
    DuplicateRecord(String),

    #[error("Missing record: {0}")]
    MissingRecord(String),

    /// Reconstruction produced a key that does not match the wallet
    #[error("Unauthorized access")]
    UnauthorizedAccess,

    #[error("Invalid user private key")]
    InvalidUserPrivateKey,

    #[error("Invalid user public key")]
    InvalidUserPublicKey,

    #[error("Invalid typed data signature: {0}")]
    InvalidTypedDataSignature(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    /// Transient infrastructure failure; callers may retry after backing off
    #[error("Temporarily unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl CustodyError {
    /// Collapse gateway outcomes into boundary errors: the transient
    /// variants all map to the generic "temporarily unavailable" code,
    /// domain errors map individually.
    pub(crate) fn from_gateway(err: GatewayError<StoreError>) -> Self {
        match err {
            GatewayError::CircuitOpen | GatewayError::CapacityExceeded | GatewayError::Timeout => {
                CustodyError::Unavailable(err.to_string())
            }
            GatewayError::Inner(store) => store.into(),
        }
    }
}

impl From<StoreError> for CustodyError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(what) => CustodyError::DuplicateRecord(what),
            StoreError::Missing(what) => CustodyError::MissingRecord(what),
            StoreError::Database(what) => CustodyError::Database(what),
        }
    }
}
