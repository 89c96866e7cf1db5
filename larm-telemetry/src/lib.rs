//! # Larm Telemetry
//!
//! Logging setup and delivery metrics for the reporting agent.

pub mod logging;
pub mod metrics;

pub use logging::EventLogger;
pub use metrics::MetricsRecorder;
