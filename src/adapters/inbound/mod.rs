mod cache_layer;
mod health;
mod http_server;

pub use cache_layer::{
    cache_layer, invalidate_layer, CacheLayerState, CacheOptions, InvalidateLayerState, KeyFn,
};
pub use health::health_router;
pub use http_server::{build_router, GatewayContext, HttpServer, SERVICE_NAME};
