pub mod access_log;
pub mod logging;
pub mod metrics;
pub mod pii_scrubber;
pub mod prometheus_exporter;

pub use access_log::AccessLogEntry;
pub use metrics::MetricsCollector;
