//! Integration tests for the gateway HTTP surface
//!
//! Drives the full router with `tower::ServiceExt::oneshot` against
//! wiremock backend servers: response envelopes, cache-aside headers,
//! direct proxy passthrough and pattern invalidation after mutations.

use api_gateway::adapters::inbound::build_router;
use api_gateway::domain::ports::{BackendRegistry, ResponseCache};
use api_gateway::{
    Aggregator, Backend, Forwarder, GatewayContext, MemoryCache, RetryPolicy, ShutdownController,
    StaticBackendRegistry,
};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::util::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_context(
    servers: &[(&str, &MockServer)],
    cache: Arc<dyn ResponseCache>,
) -> GatewayContext {
    let backends = servers
        .iter()
        .map(|(name, server)| Backend {
            name: name.to_string(),
            base_url: server.uri(),
            api_key: None,
            timeout: None,
            retries: Some(0),
        })
        .collect();

    let registry: Arc<dyn BackendRegistry> =
        Arc::new(StaticBackendRegistry::from_backends(backends));
    let forwarder = Arc::new(Forwarder::new(
        registry.clone(),
        RetryPolicy::none(),
        Duration::from_secs(2),
    ));
    let aggregator = Arc::new(Aggregator::new(forwarder.clone(), cache.clone(), true));

    GatewayContext {
        registry,
        forwarder,
        aggregator,
        cache,
        shutdown: ShutdownController::new(),
        started_at: Instant::now(),
    }
}

async fn mount_json(server: &MockServer, route: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_dashboard_sources(affiliate: &MockServer, config: &MockServer) {
    mount_json(affiliate, "/api/v1/affiliates/7", json!({"id": 7})).await;
    mount_json(affiliate, "/api/v1/affiliates/7/mlm-structure", json!({})).await;
    mount_json(config, "/api/v1/config/cpa_level_amounts/value", json!({})).await;
}

async fn get(router: &axum::Router, uri: &str) -> axum::response::Response {
    router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Test the root service descriptor
#[tokio::test]
async fn test_root_descriptor() {
    let affiliate = MockServer::start().await;
    let ctx = test_context(&[("affiliate", &affiliate)], Arc::new(MemoryCache::new()));
    let router = build_router(ctx);

    let response = get(&router, "/").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["service"], "api-gateway");
    assert_eq!(body["endpoints"]["api"], "/api/v1");
}

/// Test the basic health check with a ready cache
#[tokio::test]
async fn test_health_endpoint() {
    let affiliate = MockServer::start().await;
    let ctx = test_context(&[("affiliate", &affiliate)], Arc::new(MemoryCache::new()));
    let router = build_router(ctx);

    let response = get(&router, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["checks"]["gateway"]["status"], "ok");
    assert_eq!(body["checks"]["cache"]["status"], "ok");
    assert_eq!(body["checks"]["cache"]["state"], "ready");
}

/// Test the per-service health report
#[tokio::test]
async fn test_health_services_report() {
    let affiliate = MockServer::start().await;
    let config = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&affiliate)
        .await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&config)
        .await;

    let ctx = test_context(
        &[("affiliate", &affiliate), ("config", &config)],
        Arc::new(MemoryCache::new()),
    );
    let router = build_router(ctx);

    let response = get(&router, "/health/services").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["summary"]["total"], 2);
    assert_eq!(body["data"]["summary"]["healthy"], 1);
    assert_eq!(body["data"]["summary"]["unhealthy"], 1);
}

/// Test the aggregate envelope and the cache-aside headers
#[tokio::test]
async fn test_dashboard_envelope_and_cache_headers() {
    let affiliate = MockServer::start().await;
    let config = MockServer::start().await;
    mount_dashboard_sources(&affiliate, &config).await;

    let ctx = test_context(
        &[("affiliate", &affiliate), ("config", &config)],
        Arc::new(MemoryCache::new()),
    );
    let shutdown = ctx.shutdown.clone();
    let router = build_router(ctx);

    let first = get(&router, "/api/v1/affiliates/7/dashboard").await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.headers()["x-cache"], "MISS");
    assert_eq!(
        first.headers()["x-cache-key"],
        "api:GET:/affiliates/7/dashboard"
    );

    let first_bytes = first.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&first_bytes).unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["source"], "aggregated");
    assert_eq!(body["data"]["affiliate"]["id"], 7);

    // Let the detached store task land before the second request.
    shutdown.shutdown();
    shutdown.wait_for_drain(Duration::from_secs(2)).await;

    let second = get(&router, "/api/v1/affiliates/7/dashboard").await;
    assert_eq!(second.headers()["x-cache"], "HIT");

    let second_bytes = second.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(first_bytes, second_bytes);
}

/// Test that a failed essential source surfaces as a generic 500
#[tokio::test]
async fn test_dashboard_failure_is_a_generic_500() {
    let affiliate = MockServer::start().await;
    let config = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"secret": "stacktrace"})))
        .mount(&affiliate)
        .await;

    let ctx = test_context(
        &[("affiliate", &affiliate), ("config", &config)],
        Arc::new(MemoryCache::new()),
    );
    let router = build_router(ctx);

    let response = get(&router, "/api/v1/affiliates/7/dashboard").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = body_json(response).await;
    assert_eq!(body["error"], "internal server error");
    // No backend detail leaks into the client-facing message.
    assert!(body["message"].as_str().unwrap().contains("dashboard"));
    assert!(body.get("secret").is_none());
    assert!(body.get("timestamp").is_some());
}

/// Test that the direct proxy passes backend status and body through
#[tokio::test]
async fn test_proxy_passes_status_and_body_through() {
    let data = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/data/widgets"))
        .respond_with(ResponseTemplate::new(418).set_body_json(json!({"teapot": true})))
        .mount(&data)
        .await;

    let ctx = test_context(&[("data", &data)], Arc::new(MemoryCache::new()));
    let router = build_router(ctx);

    let response = get(&router, "/api/v1/data/widgets").await;
    assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);

    let body = body_json(response).await;
    assert_eq!(body, json!({"teapot": true}));
}

/// Test that the proxy forwards query parameters
#[tokio::test]
async fn test_proxy_forwards_query_parameters() {
    let data = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/data/widgets"))
        .and(wiremock::matchers::query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"page": 2})))
        .expect(1)
        .mount(&data)
        .await;

    let ctx = test_context(&[("data", &data)], Arc::new(MemoryCache::new()));
    let router = build_router(ctx);

    let response = get(&router, "/api/v1/data/widgets?page=2").await;
    assert_eq!(response.status(), StatusCode::OK);
}

/// Test that an unknown service segment yields a 404 envelope
#[tokio::test]
async fn test_unknown_service_segment_is_404() {
    let affiliate = MockServer::start().await;
    let ctx = test_context(&[("affiliate", &affiliate)], Arc::new(MemoryCache::new()));
    let router = build_router(ctx);

    let response = get(&router, "/api/v1/billing/invoices").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["error"], "endpoint not found");
    assert!(affiliate.received_requests().await.unwrap().is_empty());
}

/// Test that a route outside the API surface yields a 404 envelope
#[tokio::test]
async fn test_unknown_route_is_404() {
    let affiliate = MockServer::start().await;
    let ctx = test_context(&[("affiliate", &affiliate)], Arc::new(MemoryCache::new()));
    let router = build_router(ctx);

    let response = get(&router, "/nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["error"], "endpoint not found");
}

/// Test that a successful mutation invalidates the cached views
#[tokio::test]
async fn test_mutating_request_invalidates_cached_views() {
    let affiliate = MockServer::start().await;
    let config = MockServer::start().await;
    mount_dashboard_sources(&affiliate, &config).await;

    Mock::given(method("POST"))
        .and(path("/api/v1/affiliates"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 8})))
        .mount(&affiliate)
        .await;

    let cache = Arc::new(MemoryCache::new());
    let ctx = test_context(
        &[("affiliate", &affiliate), ("config", &config)],
        cache.clone(),
    );
    let shutdown = ctx.shutdown.clone();
    let router = build_router(ctx);

    // Prime the view cache through the aggregate endpoint.
    let response = get(&router, "/api/v1/affiliates/7/dashboard").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(cache.exists("dashboard:7").await);

    let post = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/affiliates")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"name": "bob"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(post.status(), StatusCode::CREATED);

    // Let the detached invalidation task land.
    shutdown.shutdown();
    shutdown.wait_for_drain(Duration::from_secs(2)).await;

    assert!(!cache.exists("dashboard:7").await);
}

/// Test that error responses are never stored by the cache layer
#[tokio::test]
async fn test_error_responses_are_not_cached() {
    let affiliate = MockServer::start().await;
    let config = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&affiliate)
        .await;

    let cache = Arc::new(MemoryCache::new());
    let ctx = test_context(
        &[("affiliate", &affiliate), ("config", &config)],
        cache.clone(),
    );
    let shutdown = ctx.shutdown.clone();
    let router = build_router(ctx);

    let response = get(&router, "/api/v1/affiliates/7/dashboard").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()["x-cache"], "MISS");

    shutdown.shutdown();
    shutdown.wait_for_drain(Duration::from_secs(2)).await;

    assert!(!cache.exists("api:GET:/affiliates/7/dashboard").await);
    assert!(!cache.exists("dashboard:7").await);
}

/// Test that a failed mutation leaves the cache untouched
#[tokio::test]
async fn test_failed_mutation_keeps_cached_views() {
    let affiliate = MockServer::start().await;
    let config = MockServer::start().await;
    mount_dashboard_sources(&affiliate, &config).await;

    Mock::given(method("POST"))
        .and(path("/api/v1/affiliates"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({"message": "invalid"})))
        .mount(&affiliate)
        .await;

    let cache = Arc::new(MemoryCache::new());
    let ctx = test_context(
        &[("affiliate", &affiliate), ("config", &config)],
        cache.clone(),
    );
    let shutdown = ctx.shutdown.clone();
    let router = build_router(ctx);

    let response = get(&router, "/api/v1/affiliates/7/dashboard").await;
    assert_eq!(response.status(), StatusCode::OK);

    let post = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/affiliates")
                .header("content-type", "application/json")
                .body(Body::from(r#"{}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(post.status(), StatusCode::UNPROCESSABLE_ENTITY);

    shutdown.shutdown();
    shutdown.wait_for_drain(Duration::from_secs(2)).await;

    assert!(cache.exists("dashboard:7").await);
}
