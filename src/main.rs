//! api-gateway - Resilient API Gateway
//!
//! This is the composition root that wires together all the components.

use api_gateway::adapters::inbound::{GatewayContext, HttpServer};
use api_gateway::adapters::outbound::{
    MemoryCache, NoopCache, RedisCache, RedisCacheConfig, StaticBackendRegistry,
};
use api_gateway::application::{Aggregator, Forwarder};
use api_gateway::config::{load_config, CacheBackend};
use api_gateway::domain::ports::{BackendRegistry, ResponseCache};
use api_gateway::domain::value_objects::RetryPolicy;
use api_gateway::infrastructure::shutdown::{shutdown_signal, ShutdownController};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    tracing::info!(
        "starting api-gateway listen={} cache={} services={}",
        cfg.listen_addr,
        cfg.cache_backend,
        cfg.services.len()
    );

    // ===== COMPOSITION ROOT =====
    // Wire up all adapters and services

    // 1. Create outbound adapters

    // Backend registry (static, from configuration)
    let registry: Arc<dyn BackendRegistry> = Arc::new(StaticBackendRegistry::new(&cfg.services));
    for service in &cfg.services {
        tracing::info!("backend {}: {}", service.name, service.url);
    }

    // Response cache
    let cache: Arc<dyn ResponseCache> = match cfg.cache_backend {
        CacheBackend::Redis => {
            let redis = RedisCache::new(RedisCacheConfig {
                url: cfg.redis_url.clone(),
                connect_timeout: Duration::from_secs(5),
                max_reconnect_attempts: cfg.cache_reconnect_max_attempts,
                reconnect_base_delay: Duration::from_millis(cfg.cache_reconnect_base_ms),
                reconnect_max_delay: Duration::from_millis(cfg.cache_reconnect_max_ms),
            })?;
            redis.connect().await;
            Arc::new(redis)
        }
        CacheBackend::Memory => Arc::new(MemoryCache::new()),
        CacheBackend::Disabled => Arc::new(NoopCache::new()),
    };

    // 2. Create application services
    let forwarder = Arc::new(Forwarder::new(
        registry.clone(),
        RetryPolicy::new(
            cfg.proxy_retries,
            Duration::from_millis(cfg.proxy_retry_delay_ms),
        ),
        Duration::from_millis(cfg.proxy_timeout_ms),
    ));

    let aggregator = Arc::new(Aggregator::new(
        forwarder.clone(),
        cache.clone(),
        cfg.aggregation_enabled,
    ));

    // 3. Shutdown coordination for the server and background cache tasks
    let shutdown = ShutdownController::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    // 4. Create inbound adapter and run
    let ctx = GatewayContext {
        registry,
        forwarder,
        aggregator,
        cache,
        shutdown: shutdown.clone(),
        started_at: Instant::now(),
    };

    let server = HttpServer::new(cfg.listen_addr.clone(), ctx);
    server.run().await?;

    // Drain pending cache writes/invalidations before exiting
    if !shutdown
        .wait_for_drain(Duration::from_secs(cfg.drain_timeout_secs))
        .await
    {
        tracing::warn!("exiting with undrained background cache tasks");
    }

    tracing::info!("api-gateway stopped");
    Ok(())
}
