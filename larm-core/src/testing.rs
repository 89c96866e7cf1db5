//! In-memory ports shared by the unit tests.

use std::collections::VecDeque;
use std::sync::Arc;

use larm_config::{LarmConfig, StorageStrategy};
use larm_entry::{decode, decode_payload_for, Entry, EntryKind};
use parking_lot::Mutex;

use crate::error::PortError;
use crate::ports::{CloudPort, IdentityProvider, KernelPort, Ports, RetainedPort, StoragePort};

pub(crate) type Shared = Arc<Mutex<Journal>>;

/// Which port calls should fail.
#[derive(Debug, Default)]
pub(crate) struct FailPlan {
    pub send_alert: bool,
    pub send_payload_header: bool,
    pub send_chunk: Option<u16>,
    pub store_alert: bool,
    pub retain_alert: bool,
}

/// Everything the fake ports saw or hold.
#[derive(Debug, Default)]
pub(crate) struct Journal {
    pub calls: Vec<&'static str>,
    pub sent: Vec<Vec<u8>>,
    pub stored: VecDeque<Vec<u8>>,
    pub retained: Vec<Vec<u8>>,
    pub session: Option<Vec<u8>>,
    pub fail: FailPlan,
}

impl Journal {
    pub fn shared() -> Shared {
        Arc::new(Mutex::new(Journal::default()))
    }
}

fn copy_out(raw: &[u8], buf: &mut [u8]) -> Result<Option<usize>, PortError> {
    let dst = buf
        .get_mut(..raw.len())
        .ok_or(PortError::Rejected("buffer too small"))?;
    dst.copy_from_slice(raw);
    Ok(Some(raw.len()))
}

pub(crate) struct MemoryCloud(pub Shared);

impl CloudPort for MemoryCloud {
    fn send_alert(&mut self, entry: &Entry<'_>) -> Result<(), PortError> {
        let mut journal = self.0.lock();
        journal.calls.push("send_alert");
        if journal.fail.send_alert {
            return Err(PortError::Unavailable);
        }
        journal.sent.push(entry.as_bytes().to_vec());
        Ok(())
    }

    fn send_payload(&mut self, entry: &Entry<'_>) -> Result<(), PortError> {
        let mut journal = self.0.lock();
        journal.calls.push("send_payload");
        let failing = match entry.kind() {
            EntryKind::PayloadHeader => journal.fail.send_payload_header,
            _ => journal.fail.send_chunk == Some(entry.chunk_index()),
        };
        if failing {
            return Err(PortError::Unavailable);
        }
        journal.sent.push(entry.as_bytes().to_vec());
        Ok(())
    }
}

pub(crate) struct MemoryStorage(pub Shared);

impl MemoryStorage {
    pub fn new(journal: Shared) -> Self {
        Self(journal)
    }
}

impl StoragePort for MemoryStorage {
    fn store_alert(&mut self, entry: &Entry<'_>, _overwrite: bool) -> Result<(), PortError> {
        let mut journal = self.0.lock();
        journal.calls.push("store_alert");
        if journal.fail.store_alert {
            return Err(PortError::Full);
        }
        journal.stored.push_back(entry.as_bytes().to_vec());
        Ok(())
    }

    fn store_payload(&mut self, entry: &Entry<'_>, _overwrite: bool) -> Result<(), PortError> {
        let mut journal = self.0.lock();
        journal.calls.push("store_payload");
        journal.stored.push_back(entry.as_bytes().to_vec());
        Ok(())
    }

    fn next_alert(&mut self, buf: &mut [u8]) -> Result<Option<usize>, PortError> {
        let mut journal = self.0.lock();
        while let Some(raw) = journal.stored.pop_front() {
            if matches!(decode(&raw), Ok(entry) if entry.kind() == EntryKind::Alert) {
                return copy_out(&raw, buf);
            }
        }
        Ok(None)
    }

    fn next_payload(
        &mut self,
        session_id: &[u8],
        alert_id: u32,
        buf: &mut [u8],
    ) -> Result<Option<usize>, PortError> {
        let mut journal = self.0.lock();
        let found = journal
            .stored
            .iter()
            .position(|raw| decode_payload_for(raw, session_id, alert_id).is_ok());
        match found.and_then(|index| journal.stored.remove(index)) {
            Some(raw) => copy_out(&raw, buf),
            None => Ok(None),
        }
    }

    fn store_session(&mut self, record: &[u8]) -> Result<(), PortError> {
        self.0.lock().session = Some(record.to_vec());
        Ok(())
    }

    fn load_session(&mut self, buf: &mut [u8]) -> Result<Option<usize>, PortError> {
        match &self.0.lock().session {
            Some(raw) => copy_out(raw, buf),
            None => Ok(None),
        }
    }
}

pub(crate) struct MemoryRetained {
    journal: Shared,
    cursor: usize,
}

impl MemoryRetained {
    pub fn new(journal: Shared) -> Self {
        Self { journal, cursor: 0 }
    }
}

impl RetainedPort for MemoryRetained {
    fn write_alert(&mut self, entry: &Entry<'_>) -> Result<(), PortError> {
        let mut journal = self.journal.lock();
        journal.calls.push("retain_alert");
        if journal.fail.retain_alert {
            return Err(PortError::Unavailable);
        }
        journal.retained.clear();
        journal.retained.push(entry.as_bytes().to_vec());
        Ok(())
    }

    fn write_payload(&mut self, entry: &Entry<'_>) -> Result<(), PortError> {
        let mut journal = self.journal.lock();
        journal.calls.push("retain_payload");
        journal.retained.push(entry.as_bytes().to_vec());
        Ok(())
    }

    fn read_alert(&mut self, buf: &mut [u8]) -> Result<Option<usize>, PortError> {
        let journal = self.journal.lock();
        self.cursor = 1;
        match journal.retained.first() {
            Some(raw) => copy_out(raw, buf),
            None => Ok(None),
        }
    }

    fn read_payload(&mut self, buf: &mut [u8]) -> Result<Option<usize>, PortError> {
        let journal = self.journal.lock();
        match journal.retained.get(self.cursor) {
            Some(raw) => {
                self.cursor += 1;
                copy_out(raw, buf)
            }
            None => Ok(None),
        }
    }

    fn clear(&mut self) -> Result<(), PortError> {
        self.journal.lock().retained.clear();
        self.cursor = 0;
        Ok(())
    }

    fn has_data(&self) -> bool {
        !self.journal.lock().retained.is_empty()
    }
}

pub(crate) struct FixedKernel(pub &'static str);

impl KernelPort for FixedKernel {
    fn current_task_name(&self) -> &str {
        self.0
    }
}

/// Writes as much as fits and reports the full length, so an oversized
/// value is visible to the caller.
pub(crate) struct StaticIdentity {
    pub session_id: String,
    pub device_name: String,
}

impl StaticIdentity {
    pub fn new(session_id: &str, device_name: &str) -> Self {
        Self {
            session_id: session_id.to_owned(),
            device_name: device_name.to_owned(),
        }
    }
}

fn write_value(value: &str, buf: &mut [u8]) -> usize {
    let len = value.len().min(buf.len());
    buf[..len].copy_from_slice(&value.as_bytes()[..len]);
    value.len()
}

impl IdentityProvider for StaticIdentity {
    fn unique_session_id(&mut self, buf: &mut [u8]) -> Result<usize, PortError> {
        Ok(write_value(&self.session_id, buf))
    }

    fn device_name(&mut self, buf: &mut [u8]) -> Result<usize, PortError> {
        Ok(write_value(&self.device_name, buf))
    }
}

/// Small limits so chunking shows up with short attachments, and a storage
/// strategy that accepts alerts.
pub(crate) fn config() -> LarmConfig {
    let mut config = LarmConfig::default();
    config.limits.max_symptoms = 4;
    config.limits.max_attachments = 2;
    config.limits.max_chunk_size = 1000;
    config.session.storage_strategy = StorageStrategy::Skip;
    config
}

/// Ports over one journal, with a retained slot.
pub(crate) fn ports(journal: &Shared) -> Ports {
    Ports::new(
        MemoryCloud(journal.clone()),
        MemoryStorage::new(journal.clone()),
        FixedKernel("SensorTask"),
        StaticIdentity::new("boot-0042", "pump-7"),
    )
    .with_retained(MemoryRetained::new(journal.clone()))
}
