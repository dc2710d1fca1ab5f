//! Subscriber setup: JSON lines (one object per line) or human-readable output.

use std::time::Duration;
use tracing::info;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub struct StructuredLogger;

impl StructuredLogger {
    /// Install the global subscriber; RUST_LOG overrides `default_level`. Logs go to
    /// stderr so stdout stays free for record output.
    pub fn init(json: bool, default_level: &str) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
        if json {
            let fmt = tracing_subscriber::fmt::layer()
                .json()
                .with_span_events(FmtSpan::NONE)
                .with_writer(std::io::stderr);
            let _ = tracing_subscriber::registry().with(filter).with(fmt).try_init();
        } else {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .try_init();
        }
    }
}

/// Log how many records a phase handled and at what rate.
pub fn report_throughput(phase: &str, records: u64, elapsed: Duration) {
    let secs = elapsed.as_secs_f64();
    let rate = if secs > 0.0 { records as f64 / secs } else { 0.0 };
    info!(
        phase,
        records,
        elapsed_ms = elapsed.as_millis() as u64,
        records_per_sec = rate,
        "phase finished"
    );
}
