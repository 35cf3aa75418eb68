//! In-Memory Response Cache (DashMap)
//!
//! Single-process cache adapter with lazy TTL expiry and glob-style
//! pattern invalidation. Used as the `memory` cache backend and by the
//! test suites.

use crate::domain::ports::{CacheState, CacheStats, ResponseCache};
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};

struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

/// DashMap-backed response cache.
pub struct MemoryCache {
    entries: DashMap<String, MemoryEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of live entries (expired ones are dropped on the way).
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResponseCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove(key);
        }
        None
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> bool {
        self.entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        true
    }

    async fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    async fn exists(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }

    async fn invalidate_pattern(&self, pattern: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !glob_match(pattern, key));
        before - self.entries.len()
    }

    async fn flush_all(&self) -> bool {
        self.entries.clear();
        true
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            enabled: true,
            state: CacheState::Ready,
        }
    }
}

/// Minimal glob matcher supporting `*` wildcards, the subset Redis key
/// patterns use here (`ranking:*`, exact keys).
fn glob_match(pattern: &str, key: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == key;
    }

    let parts: Vec<&str> = pattern.split('*').collect();
    let first = parts[0];
    let last = parts[parts.len() - 1];

    if !key.starts_with(first) {
        return false;
    }

    let mut pos = first.len();
    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        match key[pos..].find(part) {
            Some(idx) => pos = pos + idx + part.len(),
            None => return false,
        }
    }

    if last.is_empty() {
        return true;
    }
    key.len() >= pos + last.len() && key.ends_with(last)
}
