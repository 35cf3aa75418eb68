//! Redis Response Cache
//!
//! Cache adapter backed by a single shared multiplexed Redis
//! connection with store-native TTLs. Availability follows an explicit
//! state machine: Disconnected -> Connecting -> Ready, any transport
//! error drops back to Disconnected with bounded reconnect attempts
//! (capped incremental backoff), and exhausting those attempts leaves
//! the cache Disabled for the rest of the process lifetime. While not
//! Ready, every operation silently degrades per the port contract.

use crate::domain::ports::{CacheState, CacheStats, ResponseCache};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Connection behavior for the Redis cache.
#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    pub url: String,
    pub connect_timeout: Duration,
    /// Reconnect attempts before the cache gives up for good
    pub max_reconnect_attempts: u32,
    /// Base delay the reconnect backoff grows from
    pub reconnect_base_delay: Duration,
    /// Upper bound on the reconnect backoff
    pub reconnect_max_delay: Duration,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            connect_timeout: Duration::from_secs(5),
            max_reconnect_attempts: 5,
            reconnect_base_delay: Duration::from_millis(100),
            reconnect_max_delay: Duration::from_secs(3),
        }
    }
}

// CacheState encoded for atomic access.
const STATE_DISCONNECTED: u32 = 0;
const STATE_CONNECTING: u32 = 1;
const STATE_READY: u32 = 2;
const STATE_DISABLED: u32 = 3;

struct Inner {
    client: redis::Client,
    conn: RwLock<Option<MultiplexedConnection>>,
    state: AtomicU32,
    reconnect_attempts: AtomicU32,
    reconnecting: AtomicBool,
    config: RedisCacheConfig,
}

impl Inner {
    fn state(&self) -> CacheState {
        match self.state.load(Ordering::SeqCst) {
            STATE_CONNECTING => CacheState::Connecting,
            STATE_READY => CacheState::Ready,
            STATE_DISABLED => CacheState::Disabled,
            _ => CacheState::Disconnected,
        }
    }

    fn set_state(&self, state: CacheState) {
        let value = match state {
            CacheState::Disconnected => STATE_DISCONNECTED,
            CacheState::Connecting => STATE_CONNECTING,
            CacheState::Ready => STATE_READY,
            CacheState::Disabled => STATE_DISABLED,
        };
        self.state.store(value, Ordering::SeqCst);
    }

    /// One connection attempt. Returns whether the cache is Ready.
    async fn try_connect(inner: &Arc<Inner>) -> bool {
        inner.set_state(CacheState::Connecting);

        let attempt = tokio::time::timeout(
            inner.config.connect_timeout,
            inner.client.get_multiplexed_async_connection(),
        )
        .await;

        match attempt {
            Ok(Ok(conn)) => {
                *inner.conn.write().await = Some(conn);
                inner.reconnect_attempts.store(0, Ordering::SeqCst);
                inner.set_state(CacheState::Ready);
                tracing::info!("cache: redis connection ready");
                true
            }
            Ok(Err(err)) => {
                tracing::warn!("cache: redis connect failed: {}", err);
                inner.set_state(CacheState::Disconnected);
                false
            }
            Err(_) => {
                tracing::warn!("cache: redis connect timed out");
                inner.set_state(CacheState::Disconnected);
                false
            }
        }
    }

    /// Drop to Disconnected and start the bounded reconnect loop
    /// unless one is already running or the cache is Disabled.
    fn start_reconnect(inner: &Arc<Inner>) {
        if inner.state() == CacheState::Disabled {
            return;
        }
        inner.set_state(CacheState::Disconnected);

        if inner.reconnecting.swap(true, Ordering::SeqCst) {
            return;
        }

        let inner = Arc::clone(inner);
        tokio::spawn(async move {
            loop {
                let attempt = inner.reconnect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt > inner.config.max_reconnect_attempts {
                    *inner.conn.write().await = None;
                    inner.set_state(CacheState::Disabled);
                    tracing::error!(
                        "cache: reconnect attempts exhausted after {} tries, cache disabled",
                        inner.config.max_reconnect_attempts
                    );
                    break;
                }

                let delay = backoff_delay(
                    attempt,
                    inner.config.reconnect_base_delay,
                    inner.config.reconnect_max_delay,
                );
                tracing::info!(
                    "cache: reconnect attempt {}/{} in {:?}",
                    attempt,
                    inner.config.max_reconnect_attempts,
                    delay
                );
                tokio::time::sleep(delay).await;

                if Inner::try_connect(&inner).await {
                    break;
                }
            }
            inner.reconnecting.store(false, Ordering::SeqCst);
        });
    }

    fn on_transport_error(inner: &Arc<Inner>, err: &redis::RedisError) {
        tracing::warn!("cache: transport error: {}", err);
        Inner::start_reconnect(inner);
    }

    /// A clone of the shared connection, only while Ready.
    async fn connection(&self) -> Option<MultiplexedConnection> {
        if self.state() != CacheState::Ready {
            return None;
        }
        self.conn.read().await.clone()
    }
}

/// Capped incremental backoff: `min(base * attempt, cap)`.
fn backoff_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    std::cmp::min(base * attempt, cap)
}

/// Redis-backed response cache.
pub struct RedisCache {
    inner: Arc<Inner>,
}

impl RedisCache {
    pub fn new(config: RedisCacheConfig) -> anyhow::Result<Self> {
        let client = redis::Client::open(config.url.as_str())?;
        Ok(Self {
            inner: Arc::new(Inner {
                client,
                conn: RwLock::new(None),
                state: AtomicU32::new(STATE_DISCONNECTED),
                reconnect_attempts: AtomicU32::new(0),
                reconnecting: AtomicBool::new(false),
                config,
            }),
        })
    }

    /// Establish the initial connection. A failure here is not fatal:
    /// the bounded reconnect loop takes over, and operations degrade
    /// silently until the cache is Ready.
    pub async fn connect(&self) {
        if !Inner::try_connect(&self.inner).await {
            Inner::start_reconnect(&self.inner);
        }
    }
}

#[async_trait]
impl ResponseCache for RedisCache {
    async fn get(&self, key: &str) -> Option<String> {
        let mut conn = self.inner.connection().await?;
        let res: redis::RedisResult<Option<String>> = conn.get(key).await;
        match res {
            Ok(value) => value,
            Err(err) => {
                Inner::on_transport_error(&self.inner, &err);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> bool {
        let Some(mut conn) = self.inner.connection().await else {
            return false;
        };

        let seconds = ttl.as_secs().max(1);
        let res: redis::RedisResult<()> = conn.set_ex(key, value, seconds).await;
        match res {
            Ok(()) => true,
            Err(err) => {
                Inner::on_transport_error(&self.inner, &err);
                false
            }
        }
    }

    async fn delete(&self, key: &str) -> bool {
        let Some(mut conn) = self.inner.connection().await else {
            return false;
        };

        let res: redis::RedisResult<i64> = conn.del(key).await;
        match res {
            Ok(removed) => removed > 0,
            Err(err) => {
                Inner::on_transport_error(&self.inner, &err);
                false
            }
        }
    }

    async fn exists(&self, key: &str) -> bool {
        let Some(mut conn) = self.inner.connection().await else {
            return false;
        };

        let res: redis::RedisResult<bool> = conn.exists(key).await;
        match res {
            Ok(found) => found,
            Err(err) => {
                Inner::on_transport_error(&self.inner, &err);
                false
            }
        }
    }

    async fn invalidate_pattern(&self, pattern: &str) -> usize {
        let Some(mut conn) = self.inner.connection().await else {
            return 0;
        };

        let keys: Vec<String> = {
            let iter: redis::RedisResult<redis::AsyncIter<'_, String>> =
                conn.scan_match(pattern).await;
            match iter {
                Ok(mut iter) => {
                    let mut keys = Vec::new();
                    while let Some(key) = iter.next_item().await {
                        keys.push(key);
                    }
                    keys
                }
                Err(err) => {
                    Inner::on_transport_error(&self.inner, &err);
                    return 0;
                }
            }
        };

        if keys.is_empty() {
            return 0;
        }

        let res: redis::RedisResult<i64> = conn.del(&keys).await;
        match res {
            Ok(removed) => removed as usize,
            Err(err) => {
                Inner::on_transport_error(&self.inner, &err);
                0
            }
        }
    }

    async fn flush_all(&self) -> bool {
        let Some(mut conn) = self.inner.connection().await else {
            return false;
        };

        let res: redis::RedisResult<()> = redis::cmd("FLUSHDB").query_async(&mut conn).await;
        match res {
            Ok(()) => true,
            Err(err) => {
                Inner::on_transport_error(&self.inner, &err);
                false
            }
        }
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            enabled: true,
            state: self.inner.state(),
        }
    }
}
