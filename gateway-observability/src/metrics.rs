use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use tracing::error;

/// Process-wide metrics registry. One instance is built at startup and
/// shared (via `Arc`) with every request task; the registry itself is
/// concurrent-safe so no external locking is needed.
pub struct MetricsCollector {
    registry: Registry,

    /// Total requests by route, method, status.
    pub http_requests_total: IntCounterVec,
    /// End-to-end request latency by route.
    pub http_request_duration: HistogramVec,
    /// In-flight request count.
    pub active_connections: IntGauge,
    /// Upstream round-trip latency by upstream host.
    pub upstream_latency: HistogramVec,
    /// Authentication attempts by outcome (`success`, `missing_token`,
    /// `invalid_token`, `forbidden`).
    pub auth_attempts_total: IntCounterVec,
    /// Token refreshes issued by the authenticator.
    pub auth_refreshes_total: IntCounterVec,
    /// Rate-limit decisions by rule and outcome (`allowed`, `denied`).
    pub rate_limit_decisions_total: IntCounterVec,
}

impl MetricsCollector {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("gateway_http_requests_total", "Total HTTP requests"),
            &["route", "method", "status"],
        )?;

        let http_request_duration = HistogramVec::new(
            HistogramOpts::new("gateway_http_request_duration_seconds", "Request latency").buckets(
                vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            ),
            &["route"],
        )?;

        let active_connections =
            IntGauge::new("gateway_active_connections", "Number of in-flight requests")?;

        let upstream_latency = HistogramVec::new(
            HistogramOpts::new("gateway_upstream_latency_seconds", "Upstream response time")
                .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["upstream"],
        )?;

        let auth_attempts_total = IntCounterVec::new(
            Opts::new("gateway_auth_attempts_total", "Authentication attempts by outcome"),
            &["outcome"],
        )?;

        let auth_refreshes_total = IntCounterVec::new(
            Opts::new("gateway_auth_refreshes_total", "Session tokens refreshed"),
            &["token_type"],
        )?;

        let rate_limit_decisions_total = IntCounterVec::new(
            Opts::new("gateway_rate_limit_decisions_total", "Rate limit decisions by rule and outcome"),
            &["rule", "outcome"],
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration.clone()))?;
        registry.register(Box::new(active_connections.clone()))?;
        registry.register(Box::new(upstream_latency.clone()))?;
        registry.register(Box::new(auth_attempts_total.clone()))?;
        registry.register(Box::new(auth_refreshes_total.clone()))?;
        registry.register(Box::new(rate_limit_decisions_total.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration,
            active_connections,
            upstream_latency,
            auth_attempts_total,
            auth_refreshes_total,
            rate_limit_decisions_total,
        })
    }

    /// Records a completed HTTP request.
    pub fn record_request(&self, route: &str, method: &str, status: u16, duration_secs: f64) {
        self.http_requests_total
            .with_label_values(&[route, method, &status.to_string()])
            .inc();
        self.http_request_duration.with_label_values(&[route]).observe(duration_secs);
    }

    pub fn record_auth_attempt(&self, outcome: &str) {
        self.auth_attempts_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_auth_refresh(&self, token_type: &str) {
        self.auth_refreshes_total.with_label_values(&[token_type]).inc();
    }

    pub fn record_rate_limit_decision(&self, rule: &str, allowed: bool) {
        let outcome = if allowed { "allowed" } else { "denied" };
        self.rate_limit_decisions_total.with_label_values(&[rule, outcome]).inc();
    }

    /// Renders the Prometheus text exposition format for `/metrics`.
    pub fn gather_text(&self) -> String {
        let encoder = TextEncoder::new();
        let metrics = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metrics, &mut buffer) {
            error!(error = %e, "failed to encode prometheus metrics");
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("failed to construct metrics registry")
    }
}
