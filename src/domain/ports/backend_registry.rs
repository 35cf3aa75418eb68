//! Backend Registry Port
//!
//! Defines the interface for resolving backend service descriptors.
//! Implementations are read-only after process start.

use crate::domain::entities::Backend;
use crate::domain::errors::GatewayError;

/// Registry of named backend services.
///
/// This is an outbound port that abstracts where the backend table
/// comes from. The forwarding client resolves every call through it and
/// the health endpoints use `list` for introspection.
pub trait BackendRegistry: Send + Sync {
    /// Resolve a backend by name.
    ///
    /// Fails with `UnknownBackend` when the name is not configured;
    /// no network call is ever made for an unknown name.
    fn resolve(&self, name: &str) -> Result<Backend, GatewayError>;

    /// All configured backends, for status reporting.
    fn list(&self) -> Vec<Backend>;
}
