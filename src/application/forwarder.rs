//! Forwarding Client - Resilient outbound calls
//!
//! Issues one outbound call to a named backend with timeout and retry
//! handling. Apart from an unknown backend name, the client never
//! raises: every outcome, including exhausted retries, is normalized
//! into a returned `ForwardResult`.

use crate::domain::entities::{Backend, ForwardRequest, ForwardResult};
use crate::domain::errors::GatewayError;
use crate::domain::ports::BackendRegistry;
use crate::domain::value_objects::RetryPolicy;
use futures::future::join_all;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

const GATEWAY_USER_AGENT: &str = concat!("api-gateway/", env!("CARGO_PKG_VERSION"));

/// Timeout used for health probes, deliberately shorter than the
/// forwarding default.
const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Health probe outcome for a single backend.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    pub service: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Resilient forwarding client.
///
/// Resolves backends through the registry, applies the retry policy to
/// retryable outcomes (transport failures, timeouts, 5xx responses),
/// and passes non-retryable responses through verbatim after a single
/// attempt.
pub struct Forwarder {
    registry: Arc<dyn BackendRegistry>,
    client: reqwest::Client,
    policy: RetryPolicy,
    default_timeout: Duration,
}

impl Forwarder {
    pub fn new(
        registry: Arc<dyn BackendRegistry>,
        policy: RetryPolicy,
        default_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            client: reqwest::Client::new(),
            policy,
            default_timeout,
        }
    }

    /// Forward one request to a named backend.
    ///
    /// Fails fast with `UnknownBackend` when the name is not
    /// registered; no outbound call is made in that case. Every other
    /// outcome is returned as a `ForwardResult`:
    /// - a non-5xx response is returned after exactly one attempt with
    ///   the backend's own status and body,
    /// - retryable outcomes are retried with linearly growing delays,
    /// - exhausting all attempts yields a synthetic 503 result naming
    ///   the backend and attempt count.
    pub async fn forward(
        &self,
        backend_name: &str,
        req: ForwardRequest,
    ) -> Result<ForwardResult, GatewayError> {
        let backend = self.registry.resolve(backend_name)?;

        let retries = req.retries.or(backend.retries).unwrap_or(self.policy.max_retries);
        let timeout = req.timeout.or(backend.timeout).unwrap_or(self.default_timeout);
        let url = format!("{}{}", backend.base_url, req.path);

        let call_started = Instant::now();
        let mut last_error: Option<String> = None;

        for attempt in 1..=retries + 1 {
            let attempt_started = Instant::now();

            match self.send_attempt(&backend, &req, &url, timeout).await {
                Ok(response) => {
                    let status = response.status();
                    let latency_ms = attempt_started.elapsed().as_millis() as u64;

                    if RetryPolicy::is_retryable_status(status.as_u16()) {
                        tracing::warn!(
                            "proxy {}: {} {} -> {} ({}ms, attempt {}/{})",
                            backend.name,
                            req.method,
                            req.path,
                            status,
                            latency_ms,
                            attempt,
                            retries + 1
                        );
                        last_error = Some(format!("server error: {}", status));
                    } else {
                        let body = response.json::<Value>().await.unwrap_or(Value::Null);
                        let success = status.is_success();

                        tracing::info!(
                            "proxy {}: {} {} -> {} ({}ms)",
                            backend.name,
                            req.method,
                            req.path,
                            status,
                            latency_ms
                        );

                        let error = if success { None } else { Some(failure_detail(&body)) };
                        return Ok(ForwardResult {
                            success,
                            status: status.as_u16(),
                            body,
                            latency_ms: call_started.elapsed().as_millis() as u64,
                            backend: backend.name.clone(),
                            error,
                        });
                    }
                }
                Err(err) => {
                    let latency_ms = attempt_started.elapsed().as_millis() as u64;
                    let reason = if err.is_timeout() {
                        "timeout".to_string()
                    } else if err.is_connect() {
                        format!("connection failed: {}", err)
                    } else {
                        format!("request failed: {}", err)
                    };

                    tracing::warn!(
                        "proxy {}: {} {} -> {} ({}ms, attempt {}/{})",
                        backend.name,
                        req.method,
                        req.path,
                        reason,
                        latency_ms,
                        attempt,
                        retries + 1
                    );
                    last_error = Some(reason);
                }
            }

            if attempt <= retries {
                tokio::time::sleep(self.policy.delay_before(attempt)).await;
            }
        }

        tracing::error!(
            "proxy {}: all {} attempts failed",
            backend.name,
            retries + 1
        );

        Ok(ForwardResult {
            success: false,
            status: 503,
            body: json!({
                "error": "service unavailable",
                "message": format!("could not reach backend '{}'", backend.name),
                "service": backend.name,
                "attempts": retries + 1,
            }),
            latency_ms: call_started.elapsed().as_millis() as u64,
            backend: backend.name.clone(),
            error: last_error,
        })
    }

    async fn send_attempt(
        &self,
        backend: &Backend,
        req: &ForwardRequest,
        url: &str,
        timeout: Duration,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let mut builder = self
            .client
            .request(req.method.clone(), url)
            .timeout(timeout)
            .header(reqwest::header::USER_AGENT, GATEWAY_USER_AGENT)
            .header(reqwest::header::CONTENT_TYPE, "application/json");

        if let Some(key) = &backend.api_key {
            builder = builder.header("X-API-Key", key);
        }

        for (name, value) in &req.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(body) = &req.body {
            let method = &req.method;
            if method == reqwest::Method::POST
                || method == reqwest::Method::PUT
                || method == reqwest::Method::PATCH
            {
                builder = builder.json(body);
            }
        }

        builder.send().await
    }

    /// Probe the `/health` endpoint of one backend.
    ///
    /// Uses a short timeout and no retries; an unknown backend is
    /// reported as unhealthy rather than raised.
    pub async fn health_check(&self, name: &str) -> ServiceHealth {
        let probe = ForwardRequest::get("/health")
            .timeout(HEALTH_PROBE_TIMEOUT)
            .retries(0);

        match self.forward(name, probe).await {
            Ok(result) => ServiceHealth {
                service: name.to_string(),
                healthy: result.success && result.status == 200,
                status: Some(result.status),
                latency_ms: Some(result.latency_ms),
                error: result.error,
            },
            Err(err) => ServiceHealth {
                service: name.to_string(),
                healthy: false,
                status: None,
                latency_ms: None,
                error: Some(err.to_string()),
            },
        }
    }

    /// Probe every registered backend concurrently.
    pub async fn health_check_all(&self) -> Vec<ServiceHealth> {
        let backends = self.registry.list();
        join_all(backends.iter().map(|b| self.health_check(&b.name))).await
    }
}

/// Best-effort failure message from a backend error payload.
fn failure_detail(body: &Value) -> String {
    body.get("message")
        .and_then(|v| v.as_str())
        .or_else(|| body.get("error").and_then(|v| v.as_str()))
        .unwrap_or("backend rejected the request")
        .to_string()
}
