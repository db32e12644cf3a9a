//! Error types for gated operations

use thiserror::Error;

/// Outcome of a gated call that did not produce the operation's own result.
///
/// The three transient variants are deliberately separate from `Inner` so
/// callers can tell "try again later" apart from "this request is invalid".
#[derive(Debug, Error)]
pub enum GatewayError<E> {
    /// The breaker is open; the operation was not invoked
    #[error("Circuit open: downstream dependency unhealthy")]
    CircuitOpen,

    /// The concurrency ceiling for this operation is saturated
    #[error("Capacity exceeded: concurrency ceiling reached")]
    CapacityExceeded,

    /// The operation outlived its deadline; any late result is discarded
    #[error("Operation timed out")]
    Timeout,

    /// Domain error returned by the wrapped operation
    #[error("{0}")]
    Inner(E),
}

impl<E> GatewayError<E> {
    /// True for outcomes a caller may retry after backing off
    pub fn is_transient(&self) -> bool {
        !matches!(self, GatewayError::Inner(_))
    }

    /// The wrapped domain error, if any
    pub fn into_inner(self) -> Option<E> {
        match self {
            GatewayError::Inner(err) => Some(err),
            _ => None,
        }
    }
}
