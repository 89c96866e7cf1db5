//! ## larm-core::dispatch
//! **Ordered delivery of a finished alert**
//!
//! ### Expectations:
//! - Attempts run in the fixed order send, store, retain and stop at the first success
//! - An attempt succeeds iff its alert entry is accepted
//! - A rejected payload header drops that attachment; a rejected chunk drops only the chunk
//! - The alert slot is reset after delivery whatever the outcome

use std::fmt;

use bitflags::bitflags;
use larm_config::{DeliveryConfig, DeliveryStrategy, StorageStrategy};
use larm_entry::{
    encode, encode_payload_header, Entry, EntryFields, EntryKind, PAYLOAD_DESCRIPTION_WIDTH,
};
use larm_telemetry::MetricsRecorder;
use tracing::{debug, error, info, info_span, warn};

use crate::agent::Agent;
use crate::alert::{AlertSlot, Attachment};
use crate::error::{Error, PortError};
use crate::ports::{CloudPort, EntrySink, RetainedPort, StoragePort};

/// One delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Send,
    Store,
    Retain,
}

impl Attempt {
    pub const ORDER: [Attempt; 3] = [Attempt::Send, Attempt::Store, Attempt::Retain];

    pub fn label(self) -> &'static str {
        match self {
            Attempt::Send => "send",
            Attempt::Store => "store",
            Attempt::Retain => "retain",
        }
    }

    pub fn flag(self) -> EndTypes {
        match self {
            Attempt::Send => EndTypes::SEND,
            Attempt::Store => EndTypes::STORE,
            Attempt::Retain => EndTypes::RETAIN,
        }
    }
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

bitflags! {
    /// Attempts enabled for an `end` call.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EndTypes: u8 {
        const SEND = 1;
        const STORE = 1 << 1;
        const RETAIN = 1 << 2;
    }
}

impl EndTypes {
    pub fn from_config(config: &DeliveryConfig) -> Self {
        let mut plan = EndTypes::empty();
        plan.set(EndTypes::SEND, config.send);
        plan.set(EndTypes::STORE, config.store);
        plan.set(EndTypes::RETAIN, config.retain);
        plan
    }
}

pub(crate) struct CloudSink<'p>(pub(crate) &'p mut dyn CloudPort);

impl EntrySink for CloudSink<'_> {
    fn on_alert(&mut self, entry: &Entry<'_>) -> Result<(), PortError> {
        self.0.send_alert(entry)
    }

    fn on_payload(&mut self, entry: &Entry<'_>) -> Result<(), PortError> {
        self.0.send_payload(entry)
    }
}

struct StorageSink<'p> {
    port: &'p mut dyn StoragePort,
    overwrite: bool,
}

impl EntrySink for StorageSink<'_> {
    fn on_alert(&mut self, entry: &Entry<'_>) -> Result<(), PortError> {
        self.port.store_alert(entry, self.overwrite)
    }

    fn on_payload(&mut self, entry: &Entry<'_>) -> Result<(), PortError> {
        self.port.store_payload(entry, self.overwrite)
    }
}

struct RetainSink<'p>(&'p mut dyn RetainedPort);

impl EntrySink for RetainSink<'_> {
    fn on_alert(&mut self, entry: &Entry<'_>) -> Result<(), PortError> {
        self.0.write_alert(entry)
    }

    fn on_payload(&mut self, entry: &Entry<'_>) -> Result<(), PortError> {
        self.0.write_payload(entry)
    }
}

/// Frames the open alert and its attachments into the scratch buffer, one
/// entry at a time.
struct Emitter<'s> {
    scratch: &'s mut [u8],
    session_id: &'s [u8],
    device_name: &'s [u8],
    device_name_width: usize,
    description_width: usize,
    max_chunk_size: usize,
    alert_id: u32,
    metrics: Option<&'s MetricsRecorder>,
}

impl Emitter<'_> {
    fn emit(
        &mut self,
        sink: &mut dyn EntrySink,
        alert: &AlertSlot,
        record: &[u8],
        attachments: &[Attachment<'_>],
    ) -> Result<(), Error> {
        let entry = encode(
            self.scratch,
            &EntryFields {
                kind: EntryKind::Alert,
                entry_id: 0,
                chunk_index: 1,
                chunk_count: 1,
                alert_id: self.alert_id,
                session_id: self.session_id,
                device_name: self.device_name,
                device_name_width: self.device_name_width,
                description: &alert.description,
                description_width: self.description_width,
                data: record,
            },
        )?;
        sink.on_alert(&entry)?;
        self.count(EntryKind::Alert);

        for (index, attachment) in attachments.iter().enumerate() {
            let entry_id = u16::try_from(index + 1)
                .map_err(|_| Error::InvalidArgument("too many attachments"))?;
            if let Err(err) = self.emit_attachment(sink, entry_id, attachment) {
                warn!(entry_id, error = %err, "Attachment dropped");
            }
        }
        Ok(())
    }

    fn emit_attachment(
        &mut self,
        sink: &mut dyn EntrySink,
        entry_id: u16,
        attachment: &Attachment<'_>,
    ) -> Result<(), Error> {
        let description = attachment.description().as_bytes();
        let size = u32::try_from(attachment.data().len())
            .map_err(|_| Error::InvalidArgument("attachment is larger than 4 GiB"))?;
        let chunk_count = u16::try_from(attachment.chunk_count(self.max_chunk_size))
            .map_err(|_| Error::InvalidArgument("attachment needs too many chunks"))?;

        let header = encode_payload_header(description, size);
        let entry = encode(
            self.scratch,
            &EntryFields {
                kind: EntryKind::PayloadHeader,
                entry_id,
                chunk_index: 1,
                chunk_count: 1,
                alert_id: self.alert_id,
                session_id: self.session_id,
                device_name: self.device_name,
                device_name_width: self.device_name_width,
                description,
                description_width: PAYLOAD_DESCRIPTION_WIDTH,
                data: &header,
            },
        )?;
        sink.on_payload(&entry)?;
        self.count(EntryKind::PayloadHeader);

        for (chunk_index, chunk) in (1..=chunk_count).zip(attachment.data().chunks(self.max_chunk_size)) {
            let fields = EntryFields {
                kind: EntryKind::PayloadChunk,
                entry_id,
                chunk_index,
                chunk_count,
                alert_id: self.alert_id,
                session_id: self.session_id,
                device_name: self.device_name,
                device_name_width: self.device_name_width,
                description,
                description_width: PAYLOAD_DESCRIPTION_WIDTH,
                data: chunk,
            };
            let delivered = encode(self.scratch, &fields)
                .map_err(Error::from)
                .and_then(|entry| sink.on_payload(&entry).map_err(Error::from));
            match delivered {
                Ok(()) => self.count(EntryKind::PayloadChunk),
                Err(err) => warn!(entry_id, chunk_index, chunk_count, error = %err, "Chunk dropped"),
            }
        }
        Ok(())
    }

    fn count(&self, kind: EntryKind) {
        if let Some(metrics) = self.metrics {
            metrics.inc_entries(kind_label(kind));
        }
    }
}

fn kind_label(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::Alert => "alert",
        EntryKind::PayloadHeader => "payload_header",
        EntryKind::PayloadChunk => "payload_chunk",
    }
}

impl Agent {
    pub(crate) fn deliver(
        &mut self,
        attachments: &[Attachment<'_>],
        plan: EndTypes,
    ) -> Result<Attempt, Error> {
        let span = info_span!(
            "deliver",
            alert_id = self.alert.alert_id,
            alert_type = self.alert.alert_type
        );
        let _guard = span.enter();

        let outcome = self.run_attempts(attachments, plan);
        self.alert.reset();
        outcome
    }

    fn run_attempts(
        &mut self,
        attachments: &[Attachment<'_>],
        plan: EndTypes,
    ) -> Result<Attempt, Error> {
        let record_len = self.seal_record()?;
        self.session.resolve_session_id(&mut *self.ports.identity)?;
        self.session.resolve_device_name(&mut *self.ports.identity)?;

        for attempt in Attempt::ORDER {
            if !plan.contains(attempt.flag()) {
                continue;
            }
            match self.attempt(attempt, attachments, record_len) {
                Ok(()) => {
                    info!(%attempt, attachments = attachments.len(), "Alert delivered");
                    if let Some(metrics) = &self.metrics {
                        metrics.inc_delivered(attempt.label());
                    }
                    return Ok(attempt);
                }
                Err(err) => warn!(%attempt, error = %err, "Delivery attempt failed"),
            }
        }

        error!("Alert could not be delivered");
        if let Some(metrics) = &self.metrics {
            metrics.inc_undelivered();
        }
        Err(Error::Undelivered)
    }

    fn attempt(
        &mut self,
        attempt: Attempt,
        attachments: &[Attachment<'_>],
        record_len: usize,
    ) -> Result<(), Error> {
        let Agent {
            limits,
            session,
            alert,
            scratch,
            record,
            ports,
            metrics,
            ..
        } = self;

        let mut emitter = Emitter {
            scratch: scratch.as_mut_slice(),
            session_id: session.session_id(),
            device_name: session.device_name(),
            device_name_width: limits.device_name_width,
            description_width: limits.description_width,
            max_chunk_size: limits.max_chunk_size,
            alert_id: alert.alert_id,
            metrics: metrics.as_ref(),
        };
        let record = &record[..record_len];

        match attempt {
            Attempt::Send => {
                if session.delivery_strategy() == DeliveryStrategy::Offline {
                    debug!("Send skipped while offline");
                    return Err(PortError::Unavailable.into());
                }
                let mut sink = CloudSink(&mut *ports.cloud);
                emitter.emit(&mut sink, alert, record, attachments)
            }
            Attempt::Store => {
                let overwrite = match session.storage_strategy() {
                    StorageStrategy::Ignore => {
                        return Err(PortError::Rejected("storage strategy is ignore").into())
                    }
                    StorageStrategy::Overwrite => true,
                    StorageStrategy::Skip => false,
                };
                let mut sink = StorageSink {
                    port: &mut *ports.storage,
                    overwrite,
                };
                emitter.emit(&mut sink, alert, record, attachments)
            }
            Attempt::Retain => {
                let port = ports.retained.as_deref_mut().ok_or(PortError::Unavailable)?;
                emitter.emit(&mut RetainSink(port), alert, record, attachments)
            }
        }
    }
}
