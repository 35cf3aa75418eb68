//! Value Objects - Immutable domain primitives
//!
//! Value objects are identified by their value rather than identity.
//! They are immutable and can be freely shared.

use std::fmt;
use std::time::Duration;

/// Retry behavior for outbound calls.
///
/// An explicit, enumerable policy value: maximum extra attempts and the
/// base delay the linear backoff grows from. The delay before retry `k`
/// is `base_delay * k`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one
    pub max_retries: u32,
    /// Base delay the per-retry backoff is multiplied from
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay to wait before the given retry (1-based).
    pub fn delay_before(&self, retry: u32) -> Duration {
        self.base_delay * retry
    }

    /// Total attempts a call may take under this policy.
    pub fn total_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Whether a response status is worth retrying.
    ///
    /// Only 5xx-class responses are retryable; any other well-formed
    /// response is returned to the caller after a single attempt.
    pub fn is_retryable_status(status: u16) -> bool {
        (500..600).contains(&status)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000))
    }
}

/// Namespaced cache key: `<domain>:<part>:<part>:...`.
///
/// The namespace convention lets pattern-based invalidation target a
/// whole key family (e.g. `ranking:*`) after a mutating event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(prefix: &str, parts: &[&str]) -> Self {
        if parts.is_empty() {
            return Self(prefix.to_string());
        }
        Self(format!("{}:{}", prefix, parts.join(":")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
