//! Domain Errors
//!
//! The error taxonomy for gateway operations. Forwarding-level failures
//! (rejected or unreachable backends) are represented as `ForwardResult`
//! data, never as errors, so aggregation logic can treat failure as a
//! normal outcome. Only the cases below propagate as errors.

use thiserror::Error;

/// Errors raised by gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The requested backend name is not registered.
    ///
    /// Raised before any network attempt is made.
    #[error("unknown backend '{0}'")]
    UnknownBackend(String),

    /// An essential source of an aggregate view failed, so the whole
    /// view cannot be built.
    #[error("aggregate view '{view}' unavailable: {reason}")]
    AggregateFailed {
        view: &'static str,
        reason: &'static str,
    },

    /// Data aggregation is disabled by configuration.
    #[error("data aggregation is disabled")]
    AggregationDisabled,
}
