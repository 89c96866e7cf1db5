//! ## larm-telemetry::metrics
//! **Prometheus counters for alert delivery**
//!
//! ### Expectations:
//! - Counting never fails on the alert path
//! - One registry per recorder, exported in text format on demand

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub alerts_begun: IntCounter,
    pub alerts_delivered: IntCounterVec,
    pub alerts_undelivered: IntCounter,
    pub entries_emitted: IntCounterVec,
    pub alerts_replayed: IntCounter,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let alerts_begun = IntCounter::new("larm_alerts_begun_total", "Alerts opened")?;
        let alerts_delivered = IntCounterVec::new(
            Opts::new(
                "larm_alerts_delivered_total",
                "Alerts taken by a delivery attempt",
            ),
            &["attempt"],
        )?;
        let alerts_undelivered = IntCounter::new(
            "larm_alerts_undelivered_total",
            "Alerts dropped after every attempt failed",
        )?;
        let entries_emitted = IntCounterVec::new(
            Opts::new("larm_entries_emitted_total", "Entries handed to a port"),
            &["kind"],
        )?;
        let alerts_replayed =
            IntCounter::new("larm_alerts_replayed_total", "Stored alerts replayed")?;

        registry.register(Box::new(alerts_begun.clone()))?;
        registry.register(Box::new(alerts_delivered.clone()))?;
        registry.register(Box::new(alerts_undelivered.clone()))?;
        registry.register(Box::new(entries_emitted.clone()))?;
        registry.register(Box::new(alerts_replayed.clone()))?;

        Ok(Self {
            registry,
            alerts_begun,
            alerts_delivered,
            alerts_undelivered,
            entries_emitted,
            alerts_replayed,
        })
    }

    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    pub fn inc_begun(&self) {
        self.alerts_begun.inc();
    }

    pub fn inc_delivered(&self, attempt: &str) {
        self.alerts_delivered.with_label_values(&[attempt]).inc();
    }

    pub fn inc_undelivered(&self) {
        self.alerts_undelivered.inc();
    }

    pub fn inc_entries(&self, kind: &str) {
        self.entries_emitted.with_label_values(&[kind]).inc();
    }

    pub fn inc_replayed(&self) {
        self.alerts_replayed.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_exposition() {
        let metrics = MetricsRecorder::new().unwrap();
        metrics.inc_begun();
        metrics.inc_delivered("store");
        metrics.inc_entries("payload_chunk");
        metrics.inc_entries("payload_chunk");

        let text = metrics.gather_metrics().unwrap();
        assert!(text.contains("larm_alerts_begun_total 1"));
        assert!(text.contains("larm_alerts_delivered_total{attempt=\"store\"} 1"));
        assert!(text.contains("larm_entries_emitted_total{kind=\"payload_chunk\"} 2"));
    }
}
