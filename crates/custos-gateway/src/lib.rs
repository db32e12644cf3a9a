//! Custos Gateway - failure isolation for persistence operations
//!
//! Every persistence call in the system is routed through a
//! [`ResilientGateway`], which wraps it with a per-operation circuit
//! breaker, a concurrency ceiling, and a timeout race. The gateway sees
//! only success, failure, or timeout of an opaque operation; it knows
//! nothing about what runs inside.
//!
//! Breaker state is keyed by operation name, created on first use, and
//! kept for the lifetime of the process.

pub mod breaker;
pub mod config;
pub mod error;

pub use breaker::{CircuitBreaker, CircuitState};
pub use config::GatewaySettings;
pub use error::GatewayError;

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

/// Routes named operations through per-name circuit breakers.
///
/// Constructed once at startup and shared via `Arc`; per-operation
/// overrides are registered up front with [`with_operation`].
///
/// [`with_operation`]: ResilientGateway::with_operation
pub struct ResilientGateway {
    defaults: GatewaySettings,
    overrides: HashMap<String, GatewaySettings>,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl ResilientGateway {
    pub fn new(defaults: GatewaySettings) -> Self {
        Self {
            defaults,
            overrides: HashMap::new(),
            breakers: RwLock::new(HashMap::new()),
        }
    }

    /// Register settings for a specific operation name
    pub fn with_operation(mut self, name: &str, settings: GatewaySettings) -> Self {
        self.overrides.insert(name.to_string(), settings);
        self
    }

    /// Run `op` under the breaker registered for `name`
    pub async fn execute<T, E, F, Fut>(&self, name: &str, op: F) -> Result<T, GatewayError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        self.breaker(name).execute(op).await
    }

    /// Breaker for an operation name, created on first use
    pub fn breaker(&self, name: &str) -> Arc<CircuitBreaker> {
        {
            let breakers = self.read_breakers();
            if let Some(breaker) = breakers.get(name) {
                return Arc::clone(breaker);
            }
        }

        let mut breakers = self
            .breakers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let breaker = breakers.entry(name.to_string()).or_insert_with(|| {
            let settings = self
                .overrides
                .get(name)
                .cloned()
                .unwrap_or_else(|| self.defaults.clone());
            Arc::new(CircuitBreaker::new(name, settings))
        });
        Arc::clone(breaker)
    }

    fn read_breakers(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<CircuitBreaker>>> {
        self.breakers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ResilientGateway {
    fn default() -> Self {
        Self::new(GatewaySettings::default())
    }
}
