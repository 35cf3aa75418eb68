//! Domain Layer
//!
//! Core business objects and the ports the adapters implement.

pub mod entities;
pub mod errors;
pub mod ports;
pub mod value_objects;

pub use entities::{
    Backend, CorrelatedResult, DashboardView, ForwardRequest, ForwardResult, RankingView,
    SubRequest, SystemStatsView,
};
pub use errors::GatewayError;
pub use ports::{BackendRegistry, CacheState, CacheStats, ResponseCache};
pub use value_objects::{CacheKey, RetryPolicy};
