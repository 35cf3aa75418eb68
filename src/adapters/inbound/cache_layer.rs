//! Cache Middleware - cache-aside and invalidation layers
//!
//! Explicit middleware around request handling: the cache layer checks
//! the response cache before invoking the wrapped handler and stores
//! successful responses afterwards; the invalidation layer removes key
//! families after successful mutating requests. Stores and
//! invalidations run as tracked detached tasks so they never add
//! latency to the client-visible response and can still drain on
//! shutdown.

use crate::domain::ports::ResponseCache;
use crate::domain::value_objects::CacheKey;
use crate::infrastructure::shutdown::ShutdownController;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

/// Largest response body the cache layer will buffer.
const CACHE_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Custom derivation of the cache key from the inbound request line.
pub type KeyFn = Arc<dyn Fn(&Method, &Uri) -> CacheKey + Send + Sync>;

/// Behavior of one cache layer instance.
#[derive(Clone)]
pub struct CacheOptions {
    pub ttl: Duration,
    /// Status range worth caching
    pub cacheable: RangeInclusive<u16>,
    /// Key derivation override for non-default cases
    pub key_fn: Option<KeyFn>,
}

impl CacheOptions {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            cacheable: 200..=299,
            key_fn: None,
        }
    }

    pub fn key_fn(mut self, key_fn: KeyFn) -> Self {
        self.key_fn = Some(key_fn);
        self
    }
}

/// State handed to `cache_layer` via `from_fn_with_state`.
#[derive(Clone)]
pub struct CacheLayerState {
    pub cache: Arc<dyn ResponseCache>,
    pub shutdown: ShutdownController,
    pub options: CacheOptions,
}

impl CacheLayerState {
    pub fn new(
        cache: Arc<dyn ResponseCache>,
        shutdown: ShutdownController,
        options: CacheOptions,
    ) -> Self {
        Self {
            cache,
            shutdown,
            options,
        }
    }
}

/// Cache-aside middleware.
///
/// A hit short-circuits the wrapped handler and is annotated with
/// `X-Cache: HIT`; a miss runs the handler and, when the status falls
/// in the cacheable range, stores the buffered payload from a detached
/// task after the response is on its way to the client.
pub async fn cache_layer(
    State(state): State<CacheLayerState>,
    req: Request,
    next: Next,
) -> Response {
    let key = match &state.options.key_fn {
        Some(key_fn) => key_fn(req.method(), req.uri()),
        None => default_cache_key(req.method(), req.uri()),
    };

    if let Some(hit) = state.cache.get(key.as_str()).await {
        tracing::debug!("cache hit: {}", key);
        return cached_response(hit, &key);
    }
    tracing::debug!("cache miss: {}", key);

    let response = next.run(req).await;

    if !state.options.cacheable.contains(&response.status().as_u16()) {
        return annotate(response, "MISS", &key);
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, CACHE_BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!("cache: failed to buffer response body: {}", err);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let cache = Arc::clone(&state.cache);
    let guard = state.shutdown.task_guard();
    let store_key = key.clone();
    let payload = String::from_utf8_lossy(&bytes).into_owned();
    let ttl = state.options.ttl;
    tokio::spawn(async move {
        let _guard = guard;
        if cache.set(store_key.as_str(), &payload, ttl).await {
            tracing::debug!("cache set: {}", store_key);
        }
    });

    annotate(Response::from_parts(parts, Body::from(bytes)), "MISS", &key)
}

/// State handed to `invalidate_layer` via `from_fn_with_state`.
#[derive(Clone)]
pub struct InvalidateLayerState {
    pub cache: Arc<dyn ResponseCache>,
    pub shutdown: ShutdownController,
    pub patterns: Arc<Vec<String>>,
}

impl InvalidateLayerState {
    pub fn new(
        cache: Arc<dyn ResponseCache>,
        shutdown: ShutdownController,
        patterns: Vec<String>,
    ) -> Self {
        Self {
            cache,
            shutdown,
            patterns: Arc::new(patterns),
        }
    }
}

/// Invalidation middleware for mutating handlers.
///
/// After a successful mutating response, every configured key pattern
/// is invalidated from a tracked detached task; the client response is
/// never delayed or affected by the outcome.
pub async fn invalidate_layer(
    State(state): State<InvalidateLayerState>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method();
    let mutating = method == Method::POST
        || method == Method::PUT
        || method == Method::PATCH
        || method == Method::DELETE;

    let response = next.run(req).await;

    if mutating && response.status().is_success() {
        let cache = Arc::clone(&state.cache);
        let patterns = Arc::clone(&state.patterns);
        let guard = state.shutdown.task_guard();
        tokio::spawn(async move {
            let _guard = guard;
            for pattern in patterns.iter() {
                let removed = cache.invalidate_pattern(pattern).await;
                if removed > 0 {
                    tracing::debug!("cache invalidated: {} keys matching {}", removed, pattern);
                }
            }
        });
    }

    response
}

/// Default key: method plus path with query parameters sorted, so
/// equivalent requests share one entry.
pub(crate) fn default_cache_key(method: &Method, uri: &Uri) -> CacheKey {
    let target = match uri.query() {
        Some(query) => {
            let mut pairs: Vec<&str> = query.split('&').collect();
            pairs.sort_unstable();
            format!("{}?{}", uri.path(), pairs.join("&"))
        }
        None => uri.path().to_string(),
    };
    CacheKey::new("api", &[method.as_str(), &target])
}

fn cached_response(payload: String, key: &CacheKey) -> Response {
    let mut response = Response::new(Body::from(payload));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    annotate(response, "HIT", key)
}

fn annotate(mut response: Response, verdict: &'static str, key: &CacheKey) -> Response {
    let headers = response.headers_mut();
    headers.insert("x-cache", HeaderValue::from_static(verdict));
    if let Ok(value) = HeaderValue::from_str(key.as_str()) {
        headers.insert("x-cache-key", value);
    }
    response
}
