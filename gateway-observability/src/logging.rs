use gateway_core::config::LoggingConfig;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

/// Initializes the global `tracing` subscriber from the gateway's logging
/// config. Call once at process startup, before any other module logs.
///
/// `level` drives an `EnvFilter` so `RUST_LOG` can still override it for
/// local debugging; `format` picks JSON lines (production default) or
/// compact text (local development); `output` selects stdout or stderr —
/// file output is the operator's job via shell redirection, not ours.
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(level_filter(&config.level))
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let writer = match config.output.as_str() {
        "stderr" => BoxMakeWriter::new(std::io::stderr),
        _ => BoxMakeWriter::new(std::io::stdout),
    };

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer);

    if config.format == "json" {
        subscriber.json().flatten_event(true).try_init()
    } else {
        subscriber.compact().try_init()
    }
    .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

fn level_filter(level: &str) -> String {
    match level.to_ascii_uppercase().as_str() {
        "DEBUG" => "debug",
        "WARNING" => "warn",
        "ERROR" => "error",
        "CRITICAL" => "error",
        _ => "info",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_filter_maps_spec_levels() {
        assert_eq!(level_filter("DEBUG"), "debug");
        assert_eq!(level_filter("WARNING"), "warn");
        assert_eq!(level_filter("ERROR"), "error");
        assert_eq!(level_filter("CRITICAL"), "error");
        assert_eq!(level_filter("INFO"), "info");
        assert_eq!(level_filter("unknown"), "info");
    }
}
