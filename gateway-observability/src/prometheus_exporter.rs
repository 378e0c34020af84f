use crate::metrics::MetricsCollector;

/// Renders the `/metrics` Prometheus text exposition body.
pub fn render_metrics(collector: &MetricsCollector) -> String {
    collector.gather_text()
}
