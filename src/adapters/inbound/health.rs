//! Health Routes
//!
//! Gateway status reporting: a basic check consuming the cache
//! connectivity snapshot, and a per-service report built from the
//! forwarding client's concurrent health probes.

use crate::adapters::inbound::http_server::{GatewayContext, SERVICE_NAME};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;
use std::time::Instant;

pub fn health_router() -> Router<GatewayContext> {
    Router::new()
        .route("/", get(health_handler))
        .route("/services", get(services_handler))
}

async fn health_handler(State(ctx): State<GatewayContext>) -> impl IntoResponse {
    let started = Instant::now();
    let stats = ctx.cache.stats();

    let cache_status = if !stats.enabled {
        "disabled"
    } else if stats.connected() {
        "ok"
    } else {
        "error"
    };

    Json(json!({
        "success": true,
        "message": "api gateway running",
        "timestamp": Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "service": SERVICE_NAME,
        "uptime_secs": ctx.started_at.elapsed().as_secs(),
        "checks": {
            "gateway": {"status": "ok"},
            "cache": {
                "status": cache_status,
                "state": stats.state,
                "enabled": stats.enabled,
            },
        },
        "response_time_ms": started.elapsed().as_millis() as u64,
    }))
}

async fn services_handler(State(ctx): State<GatewayContext>) -> impl IntoResponse {
    let probes = ctx.forwarder.health_check_all().await;

    let services: Vec<serde_json::Value> = ctx
        .registry
        .list()
        .into_iter()
        .map(|backend| {
            let probe = probes.iter().find(|p| p.service == backend.name);
            json!({
                "name": backend.name,
                "url": backend.base_url,
                "timeout_ms": backend.timeout.map(|t| t.as_millis() as u64),
                "has_api_key": backend.api_key.is_some(),
                "healthy": probe.map(|p| p.healthy).unwrap_or(false),
                "latency_ms": probe.and_then(|p| p.latency_ms),
                "error": probe.and_then(|p| p.error.clone()),
            })
        })
        .collect();

    let healthy = services
        .iter()
        .filter(|s| s["healthy"].as_bool().unwrap_or(false))
        .count();

    Json(json!({
        "success": true,
        "data": {
            "services": services,
            "summary": {
                "total": services.len(),
                "healthy": healthy,
                "unhealthy": services.len() - healthy,
            },
        },
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
