//! ## larm-core::replay
//! **Draining stored alerts**
//!
//! ### Expectations:
//! - Every stored alert is followed by exactly its own payload entries
//! - The session id is copied out before the scratch buffer is reused, cut
//!   to the local session id width
//! - Any decode, port or sink failure ends the pass with an error

use larm_config::DeliveryStrategy;
use larm_entry::{decode, decode_payload_for, EntryError, EntryKind, SESSION_ID_WIDTH};
use larm_telemetry::MetricsRecorder;
use tracing::{debug, info, info_span};

use crate::agent::Agent;
use crate::dispatch::CloudSink;
use crate::error::{Error, PortError};
use crate::ports::{EntrySink, RetainedPort, StoragePort};
use crate::session::SessionId;

/// Where replayed entries come from.
trait ReplaySource {
    fn next_alert(&mut self, buf: &mut [u8]) -> Result<Option<usize>, PortError>;
    fn next_payload(
        &mut self,
        session_id: &[u8],
        alert_id: u32,
        buf: &mut [u8],
    ) -> Result<Option<usize>, PortError>;
}

struct StorageSource<'p>(&'p mut dyn StoragePort);

impl ReplaySource for StorageSource<'_> {
    fn next_alert(&mut self, buf: &mut [u8]) -> Result<Option<usize>, PortError> {
        self.0.next_alert(buf)
    }

    fn next_payload(
        &mut self,
        session_id: &[u8],
        alert_id: u32,
        buf: &mut [u8],
    ) -> Result<Option<usize>, PortError> {
        self.0.next_payload(session_id, alert_id, buf)
    }
}

/// Retained memory holds one alert, so the second request reports none.
struct RetainedSource<'p> {
    port: &'p mut dyn RetainedPort,
    alert_read: bool,
}

impl ReplaySource for RetainedSource<'_> {
    fn next_alert(&mut self, buf: &mut [u8]) -> Result<Option<usize>, PortError> {
        if self.alert_read || !self.port.has_data() {
            return Ok(None);
        }
        self.alert_read = true;
        self.port.read_alert(buf)
    }

    fn next_payload(
        &mut self,
        _session_id: &[u8],
        _alert_id: u32,
        buf: &mut [u8],
    ) -> Result<Option<usize>, PortError> {
        self.port.read_payload(buf)
    }
}

fn filled(scratch: &[u8], len: usize) -> Result<&[u8], Error> {
    scratch
        .get(..len)
        .ok_or(Error::Port(PortError::Rejected("read length exceeds the buffer")))
}

fn replay(
    scratch: &mut [u8],
    source: &mut dyn ReplaySource,
    sink: &mut dyn EntrySink,
    metrics: Option<&MetricsRecorder>,
) -> Result<usize, Error> {
    let mut replayed = 0;
    loop {
        scratch.fill(0);
        let Some(len) = source.next_alert(scratch)? else {
            break;
        };

        let (session_id, alert_id) = {
            let entry = decode(filled(scratch, len)?)?;
            if entry.kind() != EntryKind::Alert {
                return Err(EntryError::NotAnAlert.into());
            }
            sink.on_alert(&entry)?;
            // Wider ids from other firmware are matched on their first bytes.
            let stored = entry.session_id();
            if stored.len() > SESSION_ID_WIDTH {
                debug!(len = stored.len(), "Stored session id truncated");
            }
            let mut session_id = SessionId::new();
            session_id.extend(stored.iter().take(SESSION_ID_WIDTH).copied());
            (session_id, entry.alert_id())
        };

        let mut payloads = 0usize;
        loop {
            scratch.fill(0);
            let Some(len) = source.next_payload(&session_id, alert_id, scratch)? else {
                break;
            };
            let entry = decode_payload_for(filled(scratch, len)?, &session_id, alert_id)?;
            sink.on_payload(&entry)?;
            payloads += 1;
        }

        debug!(alert_id, payloads, "Alert replayed");
        replayed += 1;
        if let Some(metrics) = metrics {
            metrics.inc_replayed();
        }
    }
    Ok(replayed)
}

impl Agent {
    /// Sends every stored alert to the cloud port. Returns the number of
    /// alerts replayed.
    pub fn send_all(&mut self) -> Result<usize, Error> {
        if self.session.delivery_strategy() == DeliveryStrategy::Offline {
            return Err(PortError::Unavailable.into());
        }
        let span = info_span!("replay", source = "storage");
        let _guard = span.enter();

        let Agent {
            scratch,
            ports,
            metrics,
            ..
        } = self;
        let replayed = replay(
            scratch,
            &mut StorageSource(&mut *ports.storage),
            &mut CloudSink(&mut *ports.cloud),
            metrics.as_ref(),
        )?;
        info!(replayed, "Stored alerts sent");
        Ok(replayed)
    }

    /// Hands every stored alert to `sink`.
    pub fn get_all(&mut self, sink: &mut dyn EntrySink) -> Result<usize, Error> {
        let span = info_span!("replay", source = "storage");
        let _guard = span.enter();

        let Agent {
            scratch,
            ports,
            metrics,
            ..
        } = self;
        replay(
            scratch,
            &mut StorageSource(&mut *ports.storage),
            sink,
            metrics.as_ref(),
        )
    }

    /// Sends the alert kept in retained memory, clearing it once the whole
    /// alert went through.
    pub fn send_retained(&mut self) -> Result<usize, Error> {
        if self.session.delivery_strategy() == DeliveryStrategy::Offline {
            return Err(PortError::Unavailable.into());
        }
        self.drain_retained(None)
    }

    /// Hands the alert kept in retained memory to `sink`, clearing it once
    /// the whole alert went through.
    pub fn get_retained(&mut self, sink: &mut dyn EntrySink) -> Result<usize, Error> {
        self.drain_retained(Some(sink))
    }

    fn drain_retained(&mut self, sink: Option<&mut dyn EntrySink>) -> Result<usize, Error> {
        let span = info_span!("replay", source = "retained");
        let _guard = span.enter();

        let Agent {
            scratch,
            ports,
            metrics,
            ..
        } = self;
        let Some(port) = ports.retained.as_deref_mut() else {
            debug!("No retained memory port");
            return Ok(0);
        };
        let mut source = RetainedSource {
            port,
            alert_read: false,
        };

        let replayed = match sink {
            Some(sink) => replay(scratch, &mut source, sink, metrics.as_ref())?,
            None => replay(
                scratch,
                &mut source,
                &mut CloudSink(&mut *ports.cloud),
                metrics.as_ref(),
            )?,
        };
        if replayed > 0 {
            source.port.clear()?;
            info!(replayed, "Retained alert drained");
        }
        Ok(replayed)
    }
}
