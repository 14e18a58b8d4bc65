//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with SLO-aligned histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all ShopBoard metrics
pub const METRICS_PREFIX: &str = "shopboard";

/// SLO-aligned histogram buckets for request latency (in seconds)
/// Targets: P50 < 100ms on cached reports, P99 < 2.5s on cold ones
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms - P50 target
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s - P99 target
    5.000,  // 5s
    10.00,  // 10s
];

/// Buckets for outbound store API calls (paginated, slower)
pub const STORE_API_BUCKETS: &[f64] = &[
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Store API metrics
    describe_counter!(
        format!("{}_store_api_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total requests sent to connected stores"
    );

    describe_histogram!(
        format!("{}_store_api_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Store API latency in seconds"
    );

    describe_counter!(
        format!("{}_store_api_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total failed store API requests"
    );

    // Cache metrics
    describe_counter!(
        format!("{}_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache hits"
    );

    describe_counter!(
        format!("{}_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache misses"
    );

    describe_counter!(
        format!("{}_cache_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Cache operations that failed or timed out"
    );

    // Plan metrics
    describe_counter!(
        format!("{}_quota_rejections_total", METRICS_PREFIX),
        Unit::Count,
        "Store creations refused by the plan limit"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Helper to record one store API call
pub fn record_store_api(duration_secs: f64, endpoint: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_store_api_requests_total", METRICS_PREFIX),
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_store_api_duration_seconds", METRICS_PREFIX),
            "endpoint" => endpoint.to_string()
        )
        .record(duration_secs);
    } else {
        counter!(
            format!("{}_store_api_errors_total", METRICS_PREFIX),
            "endpoint" => endpoint.to_string()
        )
        .increment(1);
    }
}

/// Helper to record cache metrics
pub fn record_cache(hit: bool, cache_name: &str) {
    if hit {
        counter!(
            format!("{}_cache_hits_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    } else {
        counter!(
            format!("{}_cache_misses_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    }
}

/// Helper to record a failed or timed out cache call
pub fn record_cache_error(op: &str) {
    counter!(
        format!("{}_cache_errors_total", METRICS_PREFIX),
        "op" => op.to_string()
    )
    .increment(1);
}

/// Helper to record a store creation refused by the plan limit
pub fn record_quota_rejection(plan: &str) {
    counter!(
        format!("{}_quota_rejections_total", METRICS_PREFIX),
        "plan" => plan.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets() {
        for buckets in [LATENCY_BUCKETS, STORE_API_BUCKETS] {
            let mut prev = 0.0;
            for &bucket in buckets {
                assert!(bucket > prev);
                prev = bucket;
            }
        }

        assert!(LATENCY_BUCKETS.contains(&0.100));
        assert!(LATENCY_BUCKETS.contains(&2.500));
    }

    #[test]
    fn test_recorders_without_exporter() {
        let metrics = RequestMetrics::start("GET", "/api/v1/reports/orders");
        metrics.finish(200);
        record_cache(true, "orders");
        record_cache_error("get");
        record_store_api(0.2, "orders", false);
        record_quota_rejection("FREE");
    }
}
