//! Response Cache Port
//!
//! Defines the interface for the response cache. The cache is advisory:
//! no operation ever raises, and when the backing store is unavailable
//! every operation silently degrades to an absent/false result.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Availability of the cache backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheState {
    /// No connection to the store
    Disconnected,
    /// A connection attempt is in flight
    Connecting,
    /// Operations are served by the store
    Ready,
    /// Reconnect attempts exhausted; terminal for the process lifetime
    Disabled,
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheState::Disconnected => write!(f, "disconnected"),
            CacheState::Connecting => write!(f, "connecting"),
            CacheState::Ready => write!(f, "ready"),
            CacheState::Disabled => write!(f, "disabled"),
        }
    }
}

/// Connectivity snapshot exposed to health reporting.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheStats {
    /// Whether caching is configured at all
    pub enabled: bool,
    pub state: CacheState,
}

impl CacheStats {
    pub fn connected(&self) -> bool {
        self.state == CacheState::Ready
    }
}

/// Key/value response cache with per-entry expiry.
///
/// Keys follow the `<domain>:<part>:...` convention so that
/// `invalidate_pattern` can remove a whole family at once. Callers must
/// treat the cache as advisory, never required for correctness.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Look up a serialized value. Absent on miss, expiry, or when the
    /// store is unavailable.
    async fn get(&self, key: &str) -> Option<String>;

    /// Store a serialized value with a time-to-live. Returns whether
    /// the value was actually stored.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> bool;

    /// Remove a single key. Returns whether a key was removed.
    async fn delete(&self, key: &str) -> bool;

    /// Whether a live entry exists for the key.
    async fn exists(&self, key: &str) -> bool;

    /// Remove every key matching a glob-style pattern (e.g.
    /// `ranking:*`). Returns the number of keys removed.
    async fn invalidate_pattern(&self, pattern: &str) -> usize;

    /// Drop all entries. Returns whether the flush was performed.
    async fn flush_all(&self) -> bool;

    /// Connectivity snapshot for health reporting.
    fn stats(&self) -> CacheStats;
}
