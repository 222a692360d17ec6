//! Prometheus metrics for Sonar Watcher
//!
//! Exposes metrics endpoint for monitoring:
//! - Allium request counters (success / rate limited / errored)
//! - Request queue depth gauge
//! - Poll cycle counter
//! - Signal emission and persistence counters

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Metrics state
pub struct MetricsState {
    /// Prometheus registry
    registry: Registry,
    /// Total requests submitted to the provider queue
    pub api_requests_total: IntCounter,
    /// Requests that completed successfully
    pub api_requests_succeeded: IntCounter,
    /// Requests deferred at least once by a 429
    pub api_requests_rate_limited: IntCounter,
    /// Requests that ultimately failed
    pub api_requests_errored: IntCounter,
    /// Current depth of the provider queue
    pub queue_depth: IntGauge,
    /// Completed poll cycles
    pub poll_cycles: IntCounter,
    /// Signals emitted by the evaluator
    pub signals_emitted: IntCounter,
    /// Signals newly archived (duplicates excluded)
    pub signals_persisted: IntCounter,
    /// Notification deliveries that failed
    pub notification_failures: IntCounter,
}

impl MetricsState {
    /// Create a new metrics state with all metrics registered
    pub fn new() -> Self {
        let registry = Registry::new();

        let api_requests_total = IntCounter::with_opts(Opts::new(
            "sonar_api_requests_total",
            "Total requests submitted to the Allium queue",
        ))
        .expect("Failed to create api_requests_total counter");
        registry
            .register(Box::new(api_requests_total.clone()))
            .expect("Failed to register api_requests_total");

        let api_requests_succeeded = IntCounter::with_opts(Opts::new(
            "sonar_api_requests_succeeded_total",
            "Allium requests that completed successfully",
        ))
        .expect("Failed to create api_requests_succeeded counter");
        registry
            .register(Box::new(api_requests_succeeded.clone()))
            .expect("Failed to register api_requests_succeeded");

        let api_requests_rate_limited = IntCounter::with_opts(Opts::new(
            "sonar_api_requests_rate_limited_total",
            "Allium requests deferred by a 429 at least once",
        ))
        .expect("Failed to create api_requests_rate_limited counter");
        registry
            .register(Box::new(api_requests_rate_limited.clone()))
            .expect("Failed to register api_requests_rate_limited");

        let api_requests_errored = IntCounter::with_opts(Opts::new(
            "sonar_api_requests_errored_total",
            "Allium requests that ultimately failed",
        ))
        .expect("Failed to create api_requests_errored counter");
        registry
            .register(Box::new(api_requests_errored.clone()))
            .expect("Failed to register api_requests_errored");

        let queue_depth = IntGauge::with_opts(Opts::new(
            "sonar_queue_depth",
            "Current depth of the Allium request queue",
        ))
        .expect("Failed to create queue_depth gauge");
        registry
            .register(Box::new(queue_depth.clone()))
            .expect("Failed to register queue_depth");

        let poll_cycles = IntCounter::with_opts(Opts::new(
            "sonar_poll_cycles_total",
            "Completed wallet poll cycles",
        ))
        .expect("Failed to create poll_cycles counter");
        registry
            .register(Box::new(poll_cycles.clone()))
            .expect("Failed to register poll_cycles");

        let signals_emitted = IntCounter::with_opts(Opts::new(
            "sonar_signals_emitted_total",
            "Signals emitted by the evaluator",
        ))
        .expect("Failed to create signals_emitted counter");
        registry
            .register(Box::new(signals_emitted.clone()))
            .expect("Failed to register signals_emitted");

        let signals_persisted = IntCounter::with_opts(Opts::new(
            "sonar_signals_persisted_total",
            "Signals newly archived to the database",
        ))
        .expect("Failed to create signals_persisted counter");
        registry
            .register(Box::new(signals_persisted.clone()))
            .expect("Failed to register signals_persisted");

        let notification_failures = IntCounter::with_opts(Opts::new(
            "sonar_notification_failures_total",
            "Notification deliveries that failed",
        ))
        .expect("Failed to create notification_failures counter");
        registry
            .register(Box::new(notification_failures.clone()))
            .expect("Failed to register notification_failures");

        Self {
            registry,
            api_requests_total,
            api_requests_succeeded,
            api_requests_rate_limited,
            api_requests_errored,
            queue_depth,
            poll_cycles,
            signals_emitted,
            signals_persisted,
            notification_failures,
        }
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mirror the queue's cumulative counters into Prometheus.
    ///
    /// Counters only move forward, so the delta against the last
    /// published value is applied.
    pub fn record_queue_stats(&self, stats: &crate::allium::QueueStats) {
        let bump = |counter: &IntCounter, total: u64| {
            let current = counter.get();
            if total > current {
                counter.inc_by(total - current);
            }
        };
        bump(&self.api_requests_total, stats.submitted);
        bump(&self.api_requests_succeeded, stats.succeeded);
        bump(&self.api_requests_rate_limited, stats.rate_limited);
        bump(&self.api_requests_errored, stats.errored);
        self.queue_depth.set(stats.depth as i64);
    }

    /// Mirror the engine's cumulative poll cycle count.
    pub fn record_poll_cycles(&self, total: u64) {
        let current = self.poll_cycles.get();
        if total > current {
            self.poll_cycles.inc_by(total - current);
        }
    }
}

impl Default for MetricsState {
    fn default() -> Self {
        Self::new()
    }
}

/// Metrics handler - returns Prometheus metrics in text format
///
/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<MetricsState>>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = state.registry().gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .expect("Failed to encode metrics");

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        buffer,
    )
}

/// Create metrics router
pub fn metrics_router() -> Router<Arc<MetricsState>> {
    Router::new().route("/metrics", get(metrics_handler))
}
