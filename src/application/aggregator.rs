//! Fan-out Aggregator - Concurrent batches and aggregate views
//!
//! Issues batches of forwarding calls concurrently, joins every outcome
//! (success or failure) into one correlated result set, and composes
//! the cached aggregate views (dashboard, ranking, system stats) on top
//! of it.

use crate::domain::entities::{
    CorrelatedResult, DashboardMetrics, DashboardSources, DashboardView, ForwardRequest,
    ForwardResult, NetworkGrowth, RankingSources, RankingView, SubRequest, SystemSources,
    SystemStatsView,
};
use crate::domain::errors::GatewayError;
use crate::domain::ports::ResponseCache;
use crate::domain::value_objects::CacheKey;
use crate::application::forwarder::Forwarder;
use chrono::Utc;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const DASHBOARD_TTL: Duration = Duration::from_secs(300);
const RANKING_TTL: Duration = Duration::from_secs(300);
const SYSTEM_STATS_TTL: Duration = Duration::from_secs(600);

/// Fan-out aggregator over the forwarding client.
///
/// Partial failure is a first-class outcome: a batch waits for every
/// sub-call to settle and failed sources surface as absent view fields,
/// never as lost correlation ids.
pub struct Aggregator {
    forwarder: Arc<Forwarder>,
    cache: Arc<dyn ResponseCache>,
    enabled: bool,
}

impl Aggregator {
    pub fn new(forwarder: Arc<Forwarder>, cache: Arc<dyn ResponseCache>, enabled: bool) -> Self {
        Self {
            forwarder,
            cache,
            enabled,
        }
    }

    /// Issue a batch of sub-requests concurrently and wait for all of
    /// them to settle.
    ///
    /// Exactly one result is returned per submitted correlation id. An
    /// unknown backend inside a batch becomes a failed result rather
    /// than an error, so the correlation contract holds regardless of
    /// which sub-calls fail.
    pub async fn forward_batch(&self, batch: Vec<SubRequest>) -> Vec<CorrelatedResult> {
        let calls = batch.into_iter().map(|sub| {
            let forwarder = Arc::clone(&self.forwarder);
            async move {
                let SubRequest {
                    id,
                    backend,
                    request,
                } = sub;

                let result = match forwarder.forward(&backend, request).await {
                    Ok(result) => result,
                    Err(err) => ForwardResult {
                        success: false,
                        status: 500,
                        body: Value::Null,
                        latency_ms: 0,
                        backend: backend.clone(),
                        error: Some(err.to_string()),
                    },
                };

                CorrelatedResult { id, result }
            }
        });

        join_all(calls).await
    }

    /// Build the aggregated dashboard for one affiliate.
    ///
    /// Cache-aside under `dashboard:<id>`: a hit is returned as-is
    /// until its TTL expires. The affiliate payload is essential; MLM
    /// structure and CPA config degrade to absent fields when their
    /// source fails, and derived metrics are only computed when both
    /// succeeded.
    pub async fn affiliate_dashboard(
        &self,
        affiliate_id: &str,
        use_cache: bool,
    ) -> Result<DashboardView, GatewayError> {
        if !self.enabled {
            return Err(GatewayError::AggregationDisabled);
        }

        let key = CacheKey::new("dashboard", &[affiliate_id]);
        if use_cache {
            if let Some(view) = self.cached::<DashboardView>(&key).await {
                tracing::debug!("dashboard {} served from cache", affiliate_id);
                return Ok(view);
            }
        }

        let batch = vec![
            SubRequest::new(
                "affiliate",
                "affiliate",
                ForwardRequest::get(format!("/api/v1/affiliates/{}", affiliate_id)),
            ),
            SubRequest::new(
                "mlm_structure",
                "affiliate",
                ForwardRequest::get(format!("/api/v1/affiliates/{}/mlm-structure", affiliate_id)),
            ),
            SubRequest::new(
                "config",
                "config",
                ForwardRequest::get("/api/v1/config/cpa_level_amounts/value"),
            ),
        ];

        let results = self.forward_batch(batch).await;

        let affiliate = match take_result(&results, "affiliate") {
            Some(result) if result.success => result.body.clone(),
            _ => {
                return Err(GatewayError::AggregateFailed {
                    view: "dashboard",
                    reason: "affiliate data unavailable",
                })
            }
        };

        let mlm_structure = successful_body(&results, "mlm_structure");
        let cpa_config = successful_body(&results, "config");

        let mut view = DashboardView {
            services_status: DashboardSources {
                affiliate: true,
                mlm: mlm_structure.is_some(),
                config: cpa_config.is_some(),
            },
            affiliate,
            mlm_structure,
            cpa_config,
            calculated_metrics: None,
            aggregated_at: Utc::now().to_rfc3339(),
        };

        if let (Some(mlm), Some(config)) = (&view.mlm_structure, &view.cpa_config) {
            view.calculated_metrics = Some(compute_dashboard_metrics(&view.affiliate, mlm, config));
        }

        if use_cache {
            self.store(&key, &view, DASHBOARD_TTL).await;
        }

        tracing::info!("dashboard {} aggregated", affiliate_id);
        Ok(view)
    }

    /// Build the aggregated affiliate ranking.
    ///
    /// Cache-aside under `ranking:<order_by>:<limit>`. The ranking
    /// payload is essential; the CPA config is optional.
    pub async fn affiliate_ranking(
        &self,
        order_by: &str,
        limit: u32,
        use_cache: bool,
    ) -> Result<RankingView, GatewayError> {
        if !self.enabled {
            return Err(GatewayError::AggregationDisabled);
        }

        let limit_part = limit.to_string();
        let key = CacheKey::new("ranking", &[order_by, &limit_part]);
        if use_cache {
            if let Some(view) = self.cached::<RankingView>(&key).await {
                tracing::debug!("ranking {} served from cache", order_by);
                return Ok(view);
            }
        }

        let batch = vec![
            SubRequest::new(
                "ranking",
                "affiliate",
                ForwardRequest::get(format!(
                    "/api/v1/affiliates/ranking?limit={}&order_by={}",
                    limit, order_by
                )),
            ),
            SubRequest::new(
                "config",
                "config",
                ForwardRequest::get("/api/v1/config/cpa_level_amounts/value"),
            ),
        ];

        let results = self.forward_batch(batch).await;

        let ranking = match take_result(&results, "ranking") {
            Some(result) if result.success => result
                .body
                .get("ranking")
                .cloned()
                .unwrap_or_else(|| result.body.clone()),
            _ => {
                return Err(GatewayError::AggregateFailed {
                    view: "ranking",
                    reason: "ranking data unavailable",
                })
            }
        };

        let config = successful_body(&results, "config");

        let view = RankingView {
            services_status: RankingSources {
                ranking: true,
                config: config.is_some(),
            },
            ranking,
            config,
            order_by: order_by.to_string(),
            limit,
            aggregated_at: Utc::now().to_rfc3339(),
        };

        if use_cache {
            self.store(&key, &view, RANKING_TTL).await;
        }

        tracing::info!("ranking {} aggregated", order_by);
        Ok(view)
    }

    /// Build the aggregated system statistics.
    ///
    /// Cache-aside under `system:stats`. Both sources are optional, so
    /// the view succeeds even when every source fails.
    pub async fn system_stats(&self, use_cache: bool) -> Result<SystemStatsView, GatewayError> {
        if !self.enabled {
            return Err(GatewayError::AggregationDisabled);
        }

        let key = CacheKey::new("system", &["stats"]);
        if use_cache {
            if let Some(view) = self.cached::<SystemStatsView>(&key).await {
                tracing::debug!("system stats served from cache");
                return Ok(view);
            }
        }

        let batch = vec![
            SubRequest::new(
                "affiliate_stats",
                "affiliate",
                ForwardRequest::get("/api/v1/affiliates/stats"),
            ),
            SubRequest::new(
                "config_stats",
                "config",
                ForwardRequest::get("/api/v1/config/stats"),
            ),
        ];

        let results = self.forward_batch(batch).await;

        let affiliate_stats = successful_body(&results, "affiliate_stats");
        let config_stats = successful_body(&results, "config_stats");

        let view = SystemStatsView {
            services_status: SystemSources {
                affiliate: affiliate_stats.is_some(),
                config: config_stats.is_some(),
            },
            affiliate_stats,
            config_stats,
            aggregated_at: Utc::now().to_rfc3339(),
        };

        if use_cache {
            self.store(&key, &view, SYSTEM_STATS_TTL).await;
        }

        tracing::info!("system stats aggregated");
        Ok(view)
    }

    /// Remove every cached view an affiliate mutation can invalidate:
    /// the affiliate's own dashboard, all rankings, and system stats.
    pub async fn invalidate_affiliate(&self, affiliate_id: &str) -> usize {
        let mut removed = 0;

        let dashboard_key = CacheKey::new("dashboard", &[affiliate_id]);
        if self.cache.delete(dashboard_key.as_str()).await {
            removed += 1;
        }

        removed += self.cache.invalidate_pattern("ranking:*").await;

        if self.cache.delete("system:stats").await {
            removed += 1;
        }

        tracing::info!(
            "invalidated {} cached views for affiliate {}",
            removed,
            affiliate_id
        );
        removed
    }

    async fn cached<T: serde::de::DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let raw = self.cache.get(key.as_str()).await?;
        serde_json::from_str(&raw).ok()
    }

    async fn store<T: serde::Serialize>(&self, key: &CacheKey, view: &T, ttl: Duration) {
        if let Ok(raw) = serde_json::to_string(view) {
            self.cache.set(key.as_str(), &raw, ttl).await;
        }
    }
}

fn take_result<'a>(results: &'a [CorrelatedResult], id: &str) -> Option<&'a ForwardResult> {
    results.iter().find(|r| r.id == id).map(|r| &r.result)
}

fn successful_body(results: &[CorrelatedResult], id: &str) -> Option<Value> {
    take_result(results, id)
        .filter(|r| r.success)
        .map(|r| r.body.clone())
}

/// Derive dashboard metrics from the affiliate, MLM structure and CPA
/// config payloads. Each metric is only produced when all of its
/// inputs are present; nothing is fabricated for missing data.
fn compute_dashboard_metrics(affiliate: &Value, mlm: &Value, config: &Value) -> DashboardMetrics {
    let mut metrics = DashboardMetrics::default();

    if let Some(levels) = mlm.get("structure_by_level").and_then(|v| v.as_object()) {
        let mut earnings = serde_json::Map::new();

        for (level, data) in levels {
            let level_num = level.rsplit('_').next().unwrap_or_default();
            let cpa_value = config
                .get(format!("level_{}", level_num))
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0);

            let current_cpa = data.get("cpa").and_then(|v| v.as_f64()).unwrap_or(0.0);
            let count = data.get("count").and_then(|v| v.as_f64()).unwrap_or(0.0);
            let potential_cpa = count * cpa_value;
            let efficiency = if potential_cpa > 0.0 {
                (current_cpa / potential_cpa) * 100.0
            } else {
                0.0
            };

            earnings.insert(
                level.clone(),
                serde_json::json!({
                    "current_cpa": current_cpa,
                    "potential_cpa": potential_cpa,
                    "efficiency": efficiency,
                }),
            );
        }

        metrics.potential_earnings = Some(earnings);
    }

    let total_referrals = affiliate.get("total_referrals").and_then(|v| v.as_f64());
    let validated = affiliate
        .get("total_validated_referrals")
        .and_then(|v| v.as_f64());

    if let (Some(total), Some(validated)) = (total_referrals, validated) {
        if total > 0.0 {
            metrics.conversion_rate = Some((validated / total) * 100.0);
        }
    }

    let cpa_earned = affiliate.get("total_cpa_earned").and_then(|v| v.as_f64());
    if let (Some(earned), Some(validated)) = (cpa_earned, validated) {
        if validated > 0.0 {
            metrics.avg_cpa_per_referral = Some(earned / validated);
        }
    }

    if let Some(total_size) = mlm.get("total_network_size").and_then(|v| v.as_u64()) {
        let direct = mlm
            .get("structure_by_level")
            .and_then(|v| v.get("level_1"))
            .and_then(|v| v.get("count"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0);

        metrics.network_growth = Some(NetworkGrowth {
            total_size,
            direct_referrals: direct,
            indirect_referrals: total_size.saturating_sub(direct),
        });
    }

    metrics
}
