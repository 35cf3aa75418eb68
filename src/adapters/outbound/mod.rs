mod memory_cache;
mod noop_cache;
mod redis_cache;
mod static_registry;

pub use memory_cache::MemoryCache;
pub use noop_cache::NoopCache;
pub use redis_cache::{RedisCache, RedisCacheConfig};
pub use static_registry::StaticBackendRegistry;
