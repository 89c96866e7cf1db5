//! ## larm-telemetry::logging
//! **Structured logging through `tracing`**
//!
//! ### Expectations:
//! - One subscriber per process, installed by the host binary
//! - `RUST_LOG` overrides the configured default level
//! - Report events carry alert id and type as span fields

use tracing::info_span;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Installs the global subscriber with an `info` default.
    pub fn init() {
        Self::init_with_level("info")
    }

    /// Installs the global subscriber, falling back to `level` when
    /// `RUST_LOG` is unset. A second call is a no-op.
    pub fn init_with_level(level: &str) {
        let _ = fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
            )
            .with_thread_names(true)
            .with_span_events(FmtSpan::CLOSE)
            .try_init();
    }

    /// Logs a report lifecycle event inside a `report` span.
    #[inline]
    pub fn log_report(event: &str, alert_id: u32, alert_type: u32) {
        let span = info_span!("report", alert_id, alert_type);
        let _guard = span.enter();
        tracing::info!(event, "Report event");
    }
}
