//! No-op Response Cache
//!
//! Adapter wired when caching is disabled by configuration. Every
//! operation is the degraded result the port promises for an
//! unavailable cache, so callers need no special casing.

use crate::domain::ports::{CacheState, CacheStats, ResponseCache};
use async_trait::async_trait;
use std::time::Duration;

pub struct NoopCache;

impl NoopCache {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NoopCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResponseCache for NoopCache {
    async fn get(&self, _key: &str) -> Option<String> {
        None
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> bool {
        false
    }

    async fn delete(&self, _key: &str) -> bool {
        false
    }

    async fn exists(&self, _key: &str) -> bool {
        false
    }

    async fn invalidate_pattern(&self, _pattern: &str) -> usize {
        0
    }

    async fn flush_all(&self) -> bool {
        false
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            enabled: false,
            state: CacheState::Disabled,
        }
    }
}
