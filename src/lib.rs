//! api-gateway Library
//!
//! This module exposes the gateway components for use in integration
//! tests and as a library.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use adapters::inbound::{GatewayContext, HttpServer};
pub use adapters::outbound::{MemoryCache, NoopCache, RedisCache, RedisCacheConfig, StaticBackendRegistry};
pub use application::{Aggregator, Forwarder};
pub use config::{load_config, CacheBackend, Config, ServiceConfig};
pub use domain::entities::{Backend, ForwardRequest, ForwardResult, SubRequest};
pub use domain::errors::GatewayError;
pub use domain::ports::{BackendRegistry, CacheState, ResponseCache};
pub use domain::value_objects::{CacheKey, RetryPolicy};
pub use infrastructure::shutdown::ShutdownController;
