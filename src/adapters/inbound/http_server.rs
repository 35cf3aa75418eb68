//! HTTP Server - gateway API surface
//!
//! axum router exposing the aggregate endpoints (wrapped in the cache
//! layer), the direct JSON proxy to the backend services, health
//! reporting, and a root service descriptor.

use crate::adapters::inbound::cache_layer::{
    cache_layer, invalidate_layer, CacheLayerState, CacheOptions, InvalidateLayerState,
};
use crate::adapters::inbound::health::health_router;
use crate::application::{Aggregator, Forwarder};
use crate::domain::entities::ForwardRequest;
use crate::domain::ports::{BackendRegistry, ResponseCache};
use crate::infrastructure::shutdown::ShutdownController;
use axum::extract::{Path, Query, Request, State};
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{middleware, Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub const SERVICE_NAME: &str = "api-gateway";

/// Key families a successful mutating request invalidates.
const INVALIDATION_PATTERNS: &[&str] = &["dashboard:*", "ranking:*", "system:*", "api:*"];

/// Largest proxied request body the gateway will buffer.
const PROXY_BODY_LIMIT: usize = 10 * 1024 * 1024;

const DASHBOARD_CACHE_TTL: Duration = Duration::from_secs(300);
const RANKING_CACHE_TTL: Duration = Duration::from_secs(300);
const SYSTEM_STATS_CACHE_TTL: Duration = Duration::from_secs(600);

/// Service objects shared by every handler.
///
/// Constructed once at startup by the composition root and passed by
/// reference; nothing here is global or mutable.
#[derive(Clone)]
pub struct GatewayContext {
    pub registry: Arc<dyn BackendRegistry>,
    pub forwarder: Arc<Forwarder>,
    pub aggregator: Arc<Aggregator>,
    pub cache: Arc<dyn ResponseCache>,
    pub shutdown: ShutdownController,
    pub started_at: Instant,
}

/// Gateway HTTP server.
pub struct HttpServer {
    listen_addr: String,
    ctx: GatewayContext,
}

impl HttpServer {
    pub fn new(listen_addr: String, ctx: GatewayContext) -> Self {
        Self { listen_addr, ctx }
    }

    /// The full router, also used directly by the integration tests.
    pub fn router(&self) -> Router {
        build_router(self.ctx.clone())
    }

    /// Serve until the shutdown controller fires.
    pub async fn run(&self) -> anyhow::Result<()> {
        let app = self.router();
        let listener = TcpListener::bind(&self.listen_addr).await?;
        tracing::info!("gateway listening on {}", self.listen_addr);

        let mut shutdown_rx = self.ctx.shutdown.subscribe();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}

pub fn build_router(ctx: GatewayContext) -> Router {
    let invalidate_state = InvalidateLayerState::new(
        ctx.cache.clone(),
        ctx.shutdown.clone(),
        INVALIDATION_PATTERNS.iter().map(|p| p.to_string()).collect(),
    );

    let api = Router::new()
        .route(
            "/affiliates/ranking",
            get(ranking_handler).route_layer(middleware::from_fn_with_state(
                CacheLayerState::new(
                    ctx.cache.clone(),
                    ctx.shutdown.clone(),
                    CacheOptions::with_ttl(RANKING_CACHE_TTL),
                ),
                cache_layer,
            )),
        )
        .route(
            "/affiliates/:id/dashboard",
            get(dashboard_handler).route_layer(middleware::from_fn_with_state(
                CacheLayerState::new(
                    ctx.cache.clone(),
                    ctx.shutdown.clone(),
                    CacheOptions::with_ttl(DASHBOARD_CACHE_TTL),
                ),
                cache_layer,
            )),
        )
        .route(
            "/system/stats",
            get(stats_handler).route_layer(middleware::from_fn_with_state(
                CacheLayerState::new(
                    ctx.cache.clone(),
                    ctx.shutdown.clone(),
                    CacheOptions::with_ttl(SYSTEM_STATS_CACHE_TTL),
                ),
                cache_layer,
            )),
        )
        .fallback(proxy_handler)
        .layer(middleware::from_fn_with_state(
            invalidate_state,
            invalidate_layer,
        ));

    Router::new()
        .route("/", get(root_handler))
        .nest("/health", health_router())
        .nest("/api/v1", api)
        .fallback(not_found_handler)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "service": SERVICE_NAME,
        "message": "API gateway for the affiliate platform services",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
        "endpoints": {
            "health": "/health",
            "services": "/health/services",
            "api": "/api/v1",
        },
    }))
}

async fn dashboard_handler(
    State(ctx): State<GatewayContext>,
    Path(affiliate_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let use_cache = params.get("cache").map(|v| v != "false").unwrap_or(true);

    match ctx
        .aggregator
        .affiliate_dashboard(&affiliate_id, use_cache)
        .await
    {
        Ok(view) => aggregated_envelope(json!(view)),
        Err(err) => {
            tracing::error!("dashboard aggregation failed: {}", err);
            error_envelope(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error",
                "could not build the aggregated dashboard",
            )
        }
    }
}

async fn ranking_handler(
    State(ctx): State<GatewayContext>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let limit = params
        .get("limit")
        .and_then(|v| v.parse().ok())
        .unwrap_or(50);
    let order_by = params
        .get("order_by")
        .cloned()
        .unwrap_or_else(|| "cpa".to_string());
    let use_cache = params.get("cache").map(|v| v != "false").unwrap_or(true);

    match ctx
        .aggregator
        .affiliate_ranking(&order_by, limit, use_cache)
        .await
    {
        Ok(view) => aggregated_envelope(json!(view)),
        Err(err) => {
            tracing::error!("ranking aggregation failed: {}", err);
            error_envelope(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error",
                "could not build the aggregated ranking",
            )
        }
    }
}

async fn stats_handler(
    State(ctx): State<GatewayContext>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let use_cache = params.get("cache").map(|v| v != "false").unwrap_or(true);

    match ctx.aggregator.system_stats(use_cache).await {
        Ok(view) => aggregated_envelope(json!(view)),
        Err(err) => {
            tracing::error!("system stats aggregation failed: {}", err);
            error_envelope(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error",
                "could not build the aggregated system stats",
            )
        }
    }
}

/// Direct JSON proxy: the first path segment selects the backend
/// service, everything else is forwarded verbatim and the backend's
/// status and body are passed back unchanged.
async fn proxy_handler(State(ctx): State<GatewayContext>, req: Request) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let path = uri.path();

    let mut segments = path.trim_start_matches('/').splitn(2, '/');
    let segment = segments.next().unwrap_or("");
    let rest = segments
        .next()
        .map(|r| format!("/{}", r))
        .unwrap_or_default();

    let Some(service) = service_for_segment(segment) else {
        return error_envelope(
            StatusCode::NOT_FOUND,
            "endpoint not found",
            &format!("no route for {} /api/v1{}", method, path),
        );
    };

    let outbound_method = match reqwest::Method::from_bytes(method.as_str().as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            return error_envelope(
                StatusCode::METHOD_NOT_ALLOWED,
                "unsupported method",
                "the request method cannot be forwarded",
            )
        }
    };

    let target_path = match uri.query() {
        Some(query) => format!("/api/v1/{}{}?{}", segment, rest, query),
        None => format!("/api/v1/{}{}", segment, rest),
    };

    let mut forward = ForwardRequest::new(outbound_method, target_path);
    for name in [header::CONTENT_TYPE, header::AUTHORIZATION] {
        if let Some(value) = req.headers().get(&name).and_then(|v| v.to_str().ok()) {
            forward = forward.header(name.as_str(), value);
        }
    }

    let bytes = match axum::body::to_bytes(req.into_body(), PROXY_BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!("proxy: failed to read request body: {}", err);
            return error_envelope(
                StatusCode::BAD_REQUEST,
                "invalid request body",
                "the request body could not be read",
            );
        }
    };
    if !bytes.is_empty() {
        if let Ok(body) = serde_json::from_slice::<Value>(&bytes) {
            forward = forward.body(body);
        }
    }

    match ctx.forwarder.forward(service, forward).await {
        Ok(result) => {
            let status = StatusCode::from_u16(result.status).unwrap_or(StatusCode::BAD_GATEWAY);
            (status, Json(result.body)).into_response()
        }
        Err(err) => {
            tracing::error!("proxy to {} failed: {}", service, err);
            error_envelope(
                StatusCode::SERVICE_UNAVAILABLE,
                "service unavailable",
                "could not reach the requested service",
            )
        }
    }
}

async fn not_found_handler(uri: Uri) -> Response {
    error_envelope(
        StatusCode::NOT_FOUND,
        "endpoint not found",
        &format!("no route for {}", uri.path()),
    )
}

/// Map a `/api/v1/<segment>` path segment to its backend service.
fn service_for_segment(segment: &str) -> Option<&'static str> {
    match segment {
        "affiliates" => Some("affiliate"),
        "config" => Some("config"),
        "mlm" => Some("mlm"),
        "commission" => Some("commission"),
        "data" => Some("data"),
        _ => None,
    }
}

fn aggregated_envelope(view: Value) -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "data": view,
            "source": "aggregated",
            "timestamp": Utc::now().to_rfc3339(),
        })),
    )
        .into_response()
}

fn error_envelope(status: StatusCode, error: &str, message: &str) -> Response {
    (
        status,
        Json(json!({
            "error": error,
            "message": message,
            "timestamp": Utc::now().to_rfc3339(),
        })),
    )
        .into_response()
}
