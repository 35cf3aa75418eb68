//! Domain Entities - Core business objects
//!
//! These entities represent the core concepts of the gateway domain:
//! backend descriptors, forwarded calls and their outcomes, fan-out
//! batches, and the aggregate views composed from them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// A named backend service the gateway forwards requests to.
///
/// Backends are loaded from configuration at startup and are immutable
/// for the process lifetime.
#[derive(Debug, Clone)]
pub struct Backend {
    /// Unique service name used to address this backend
    pub name: String,
    /// Base address outbound URLs are built from
    pub base_url: String,
    /// Credential sent as an `X-API-Key` header when configured
    pub api_key: Option<String>,
    /// Per-backend default timeout, overriding the global default
    pub timeout: Option<Duration>,
    /// Per-backend default retry count, overriding the global policy
    pub retries: Option<u32>,
}

/// A single outbound call to a named backend.
///
/// Constructed per call; header overrides are merged on top of the
/// gateway's own headers, and timeout/retries override the backend and
/// global defaults when set.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: reqwest::Method,
    pub path: String,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
}

impl ForwardRequest {
    pub fn new(method: reqwest::Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: Vec::new(),
            timeout: None,
            retries: None,
        }
    }

    /// Shorthand for a GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(reqwest::Method::GET, path)
    }

    /// Shorthand for a POST request with a JSON body.
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        let mut req = Self::new(reqwest::Method::POST, path);
        req.body = Some(body);
        req
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }
}

/// Outcome of one forwarded call.
///
/// Always fully populated: the forwarding client never leaves a call
/// outcome unrepresented, even after exhausting all retry attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardResult {
    /// Whether the backend answered with a 2xx status
    pub success: bool,
    /// HTTP status of the response, or 503 for a synthetic failure
    pub status: u16,
    /// Response payload (Null when the body was not valid JSON)
    pub body: Value,
    /// Total time spent on the call, retries included
    pub latency_ms: u64,
    /// Name of the backend the call was addressed to
    pub backend: String,
    /// Failure detail for unsuccessful outcomes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One entry of a fan-out batch: a forward request tagged with a
/// caller-assigned correlation id. Ids must be unique within a batch.
#[derive(Debug, Clone)]
pub struct SubRequest {
    pub id: String,
    pub backend: String,
    pub request: ForwardRequest,
}

impl SubRequest {
    pub fn new(id: impl Into<String>, backend: impl Into<String>, request: ForwardRequest) -> Self {
        Self {
            id: id.into(),
            backend: backend.into(),
            request,
        }
    }
}

/// A forward outcome tagged with the correlation id of the sub-request
/// that produced it. A batch yields exactly one of these per submitted
/// id, regardless of completion order.
#[derive(Debug, Clone)]
pub struct CorrelatedResult {
    pub id: String,
    pub result: ForwardResult,
}

/// Per-source success map for the affiliate dashboard view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSources {
    pub affiliate: bool,
    pub mlm: bool,
    pub config: bool,
}

/// Aggregated affiliate dashboard.
///
/// The affiliate payload is essential; MLM structure and CPA config are
/// optional and left absent when their source call failed. Derived
/// metrics are only computed when both optional sources succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardView {
    pub affiliate: Value,
    pub mlm_structure: Option<Value>,
    pub cpa_config: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calculated_metrics: Option<DashboardMetrics>,
    pub aggregated_at: String,
    pub services_status: DashboardSources,
}

/// Metrics derived from the dashboard's source payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DashboardMetrics {
    /// Per-MLM-level earning potential, keyed by level name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub potential_earnings: Option<serde_json::Map<String, Value>>,
    /// Validated referrals as a percentage of total referrals
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversion_rate: Option<f64>,
    /// Average CPA earned per validated referral
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_cpa_per_referral: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_growth: Option<NetworkGrowth>,
}

/// Direct/indirect split of an affiliate's referral network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkGrowth {
    pub total_size: u64,
    pub direct_referrals: u64,
    pub indirect_referrals: u64,
}

/// Per-source success map for the ranking view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingSources {
    pub ranking: bool,
    pub config: bool,
}

/// Aggregated affiliate ranking. The ranking payload is essential; the
/// CPA config is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingView {
    pub ranking: Value,
    pub config: Option<Value>,
    pub order_by: String,
    pub limit: u32,
    pub aggregated_at: String,
    pub services_status: RankingSources,
}

/// Per-source success map for the system stats view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemSources {
    pub affiliate: bool,
    pub config: bool,
}

/// Aggregated system statistics. Both sources are optional, so this
/// view always succeeds; failed sources simply leave their field absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatsView {
    pub affiliate_stats: Option<Value>,
    pub config_stats: Option<Value>,
    pub aggregated_at: String,
    pub services_status: SystemSources,
}
