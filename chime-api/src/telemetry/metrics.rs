//! Prometheus Metrics Definitions
//!
//! Defines all Chime metrics with appropriate labels and types.
//! Exposes a /metrics endpoint for Prometheus scraping.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use chime_events::{ListenerStatsSnapshot, PoolStats};
use chime_storage::CacheStats;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_gauge_vec, CounterVec, Encoder,
    HistogramVec, IntGaugeVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<ChimeMetrics>> = Lazy::new(ChimeMetrics::new);

/// Container for all Chime metrics.
#[derive(Clone)]
pub struct ChimeMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Notification reads - labels: endpoint, outcome
    pub notification_reads_total: CounterVec,

    /// Cache service counters, refreshed at scrape - labels: counter
    pub cache_operations: IntGaugeVec,

    /// Listener outcomes, refreshed at scrape - labels: outcome
    pub listener_outcomes: IntGaugeVec,

    /// Worker pool counters, refreshed at scrape - labels: counter
    pub listener_pool: IntGaugeVec,
}

fn registration_failed(name: &str, e: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, e))
}

impl ChimeMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "chime_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| registration_failed("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "chime_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_failed("http_request_duration_seconds", e))?,

            notification_reads_total: register_counter_vec!(
                "chime_notification_reads_total",
                "Notification cache reads by endpoint and outcome",
                &["endpoint", "outcome"]
            )
            .map_err(|e| registration_failed("notification_reads_total", e))?,

            cache_operations: register_int_gauge_vec!(
                "chime_cache_operations",
                "Notification cache service counters since start",
                &["counter"]
            )
            .map_err(|e| registration_failed("cache_operations", e))?,

            listener_outcomes: register_int_gauge_vec!(
                "chime_listener_outcomes",
                "Cache listener outcomes since start",
                &["outcome"]
            )
            .map_err(|e| registration_failed("listener_outcomes", e))?,

            listener_pool: register_int_gauge_vec!(
                "chime_listener_pool",
                "Listener worker pool counters",
                &["counter"]
            )
            .map_err(|e| registration_failed("listener_pool", e))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record a notification read.
    pub fn record_read(&self, endpoint: &str, outcome: &str) {
        self.notification_reads_total
            .with_label_values(&[endpoint, outcome])
            .inc();
    }

    /// Copy the in-process counters into their gauges.
    pub fn refresh(&self, cache: &CacheStats, listeners: &ListenerStatsSnapshot, pool: &PoolStats) {
        let set = |gauge: &IntGaugeVec, label: &str, value: u64| {
            gauge.with_label_values(&[label]).set(value as i64);
        };

        set(&self.cache_operations, "hits", cache.hits);
        set(&self.cache_operations, "misses", cache.misses);
        set(&self.cache_operations, "rebuilds", cache.rebuilds);
        set(&self.cache_operations, "writes", cache.writes);
        set(&self.cache_operations, "skipped", cache.skipped);
        set(&self.cache_operations, "invalidations", cache.invalidations);
        set(&self.cache_operations, "discarded_rebuilds", cache.discarded_rebuilds);

        set(&self.listener_outcomes, "applied", listeners.applied);
        set(&self.listener_outcomes, "noop", listeners.noops);
        set(&self.listener_outcomes, "failed", listeners.failures);
        set(&self.listener_outcomes, "fail_safe_invalidated", listeners.fail_safe_invalidations);
        set(&self.listener_outcomes, "fail_safe_failed", listeners.fail_safe_errors);

        set(&self.listener_pool, "workers", pool.workers as u64);
        set(&self.listener_pool, "queued", pool.queued);
        set(&self.listener_pool, "surge_started", pool.surge_started);
        set(&self.listener_pool, "caller_runs", pool.caller_runs);
        set(&self.listener_pool, "completed", pool.completed);
        set(&self.listener_pool, "panicked", pool.panicked);
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
)]
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    if let Ok(metrics) = METRICS.as_ref() {
        metrics.refresh(
            &state.cache.stats(),
            &state.listener_stats.snapshot(),
            &state.pool.stats(),
        );
    }

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::core::Collector;

    #[test]
    fn test_metrics_creation() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        assert!(!metrics.http_requests_total.desc().is_empty());
        Ok(())
    }

    #[test]
    fn test_refresh_sets_gauges() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        let cache = CacheStats {
            hits: 7,
            rebuilds: 2,
            ..Default::default()
        };
        let listeners = ListenerStatsSnapshot {
            fail_safe_invalidations: 1,
            ..Default::default()
        };
        metrics.refresh(&cache, &listeners, &PoolStats::default());

        assert_eq!(metrics.cache_operations.with_label_values(&["hits"]).get(), 7);
        assert_eq!(
            metrics
                .listener_outcomes
                .with_label_values(&["fail_safe_invalidated"])
                .get(),
            1
        );
        Ok(())
    }

    #[test]
    fn test_record_read() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        metrics.record_read("list", "not_modified");
        assert!(
            metrics
                .notification_reads_total
                .with_label_values(&["list", "not_modified"])
                .get()
                >= 1.0
        );
        Ok(())
    }
}
