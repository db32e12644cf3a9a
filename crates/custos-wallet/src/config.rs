//! Custody engine configuration

use custos_core::MasterKey;

use crate::error::{CustodyError, Result};

/// Environment variable holding the hex-encoded master key
pub const MASTER_KEY_ENV: &str = "CUSTOS_MASTER_KEY";

/// Configuration handed to the engine at construction time
#[derive(Debug, Clone)]
pub struct CustodyConfig {
    /// Shard encryption key, loaded once at startup
    pub master_key: MasterKey,

    /// Persist the backup shard server-side alongside the custody shard.
    ///
    /// With both shards on the server, a single database compromise holds
    /// 2 of 3 pieces; this must stay an explicit policy decision.
    pub persist_backup_shard: bool,
}

impl CustodyConfig {
    pub fn new(master_key: MasterKey) -> Self {
        Self {
            master_key,
            persist_backup_shard: false,
        }
    }

    /// Opt in to server-side backup shard persistence
    pub fn with_backup_shard_persistence(mut self) -> Self {
        self.persist_backup_shard = true;
        self
    }

    /// Load the master key from `CUSTOS_MASTER_KEY` (64 hex chars)
    pub fn from_env() -> Result<Self> {
        let hex_key = std::env::var(MASTER_KEY_ENV)
            .map_err(|_| CustodyError::MissingConfiguration(MASTER_KEY_ENV.to_string()))?;
        let master_key = MasterKey::from_hex(&hex_key)?;
        Ok(Self::new(master_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backup_persistence_is_off_by_default() {
        let config = CustodyConfig::new(MasterKey::generate());
        assert!(!config.persist_backup_shard);
        assert!(config.with_backup_shard_persistence().persist_backup_shard);
    }
}
