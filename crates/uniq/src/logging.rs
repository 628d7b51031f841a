//! `tracing` subscriber setup. Logs go to stderr; stdout carries results.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber. `RUST_LOG` takes precedence over `level`.
///
/// At debug level and below, closing job spans are logged with their
/// busy/idle time so slow variations are easy to spot.
pub fn init(level: &str, json_format: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let span_events = if matches!(level, "debug" | "trace") {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_span_events(span_events)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_span_events(span_events)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// `--verbose` forces debug; `--json-logs` forces JSON. Otherwise `[logging]` decides.
pub fn init_from_config(config: &uniq_core::Config, verbose: bool, json_logs: bool) {
    let level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    init(level, json_logs || config.logging.format == "json");
}
