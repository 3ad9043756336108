//! Prometheus metrics for gateway observability

use prometheus::{
    Counter, CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Prometheus collector for request, response, and upstream metrics
#[derive(Clone)]
pub struct MetricsCollector {
    pub requests_total: CounterVec,
    pub responses_total: CounterVec,
    pub upstream_errors_total: Counter,
    pub upstream_latency_seconds: HistogramVec,
    registry: Arc<Registry>,
}

impl MetricsCollector {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let requests_total = CounterVec::new(
            Opts::new("gateway_requests_total", "Total requests received"),
            &["method", "path"],
        )?;

        let responses_total = CounterVec::new(
            Opts::new("gateway_responses_total", "Total responses by status"),
            &["status"],
        )?;

        let upstream_errors_total = Counter::new(
            "gateway_upstream_errors_total",
            "Total transport failures reaching upstream services",
        )?;

        let upstream_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "gateway_upstream_latency_seconds",
                "Upstream call latency in seconds",
            ),
            &["service"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(responses_total.clone()))?;
        registry.register(Box::new(upstream_errors_total.clone()))?;
        registry.register(Box::new(upstream_latency_seconds.clone()))?;

        Ok(Self {
            requests_total,
            responses_total,
            upstream_errors_total,
            upstream_latency_seconds,
            registry,
        })
    }

    pub fn record_request(&self, method: &str, path: &str) {
        self.requests_total.with_label_values(&[method, path]).inc();
    }

    pub fn record_response(&self, status: u16) {
        self.responses_total
            .with_label_values(&[&status.to_string()])
            .inc();
    }

    pub fn record_upstream_error(&self) {
        self.upstream_errors_total.inc();
    }

    pub fn record_upstream_latency(&self, service: &str, seconds: f64) {
        self.upstream_latency_seconds
            .with_label_values(&[service])
            .observe(seconds);
    }

    /// Render all metrics in Prometheus text exposition format
    pub fn gather(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;
        Ok(String::from_utf8(buffer).unwrap_or_default())
    }
}
