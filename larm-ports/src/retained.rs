//! Retained memory emulated in RAM: one alert, its payloads, and a
//! `{ type, size }` header in front of every entry.

use std::sync::Arc;

use larm_core::{PortError, RetainedPort};
use larm_entry::Entry;
use parking_lot::Mutex;

pub const RETAINED_ALERT: u32 = 0x3415_62AB;
pub const RETAINED_PAYLOAD: u32 = 0xE78B_AC01;

const RECORD_HEADER: usize = 8;

#[derive(Debug)]
struct Slot {
    bytes: Vec<u8>,
    write: usize,
    read: usize,
}

impl Slot {
    fn clear(&mut self) {
        self.bytes.fill(0);
        self.write = 0;
        self.read = 0;
    }

    fn write(&mut self, kind: u32, entry: &Entry<'_>) -> Result<(), PortError> {
        let data = entry.as_bytes();
        let size = u32::try_from(data.len()).map_err(|_| PortError::Rejected("entry too large"))?;
        let end = self.write + RECORD_HEADER + data.len();
        if end > self.bytes.len() {
            return Err(PortError::Full);
        }
        let at = self.write;
        self.bytes[at..at + 4].copy_from_slice(&kind.to_le_bytes());
        self.bytes[at + 4..at + 8].copy_from_slice(&size.to_le_bytes());
        self.bytes[at + RECORD_HEADER..end].copy_from_slice(data);
        self.write = end;
        Ok(())
    }

    fn read(&mut self, kind: u32, buf: &mut [u8]) -> Result<Option<usize>, PortError> {
        let at = self.read;
        let Some(header) = self.bytes.get(at..at + RECORD_HEADER) else {
            return Ok(None);
        };
        let found = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let size = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        if found != kind || size == 0 {
            return Ok(None);
        }
        let data = self
            .bytes
            .get(at + RECORD_HEADER..at + RECORD_HEADER + size)
            .ok_or(PortError::Rejected("record runs past the slot"))?;
        let dst = buf
            .get_mut(..size)
            .ok_or(PortError::Rejected("buffer too small"))?;
        dst.copy_from_slice(data);
        self.read = at + RECORD_HEADER + size;
        Ok(Some(size))
    }
}

/// Clones share the slot, standing in for memory that survives a warm
/// restart.
#[derive(Debug, Clone)]
pub struct RetainedSlot {
    slot: Arc<Mutex<Slot>>,
}

impl RetainedSlot {
    pub fn new(capacity: usize) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                bytes: vec![0; capacity],
                write: 0,
                read: 0,
            })),
        }
    }
}

impl RetainedPort for RetainedSlot {
    fn write_alert(&mut self, entry: &Entry<'_>) -> Result<(), PortError> {
        let mut slot = self.slot.lock();
        if RECORD_HEADER + entry.as_bytes().len() > slot.bytes.len() {
            return Err(PortError::Full);
        }
        slot.clear();
        slot.write(RETAINED_ALERT, entry)
    }

    fn write_payload(&mut self, entry: &Entry<'_>) -> Result<(), PortError> {
        self.slot.lock().write(RETAINED_PAYLOAD, entry)
    }

    fn read_alert(&mut self, buf: &mut [u8]) -> Result<Option<usize>, PortError> {
        let mut slot = self.slot.lock();
        slot.read = 0;
        slot.read(RETAINED_ALERT, buf)
    }

    fn read_payload(&mut self, buf: &mut [u8]) -> Result<Option<usize>, PortError> {
        self.slot.lock().read(RETAINED_PAYLOAD, buf)
    }

    fn clear(&mut self) -> Result<(), PortError> {
        self.slot.lock().clear();
        Ok(())
    }

    fn has_data(&self) -> bool {
        self.slot.lock().bytes.get(..4) == Some(&RETAINED_ALERT.to_le_bytes()[..])
    }
}

#[cfg(test)]
mod tests {
    use larm_entry::{decode, encode, EntryFields, EntryKind};

    use super::*;

    fn entry_bytes(kind: EntryKind, alert_id: u32) -> Vec<u8> {
        entry_with_data(kind, alert_id, &[1, 2, 3])
    }

    fn entry_with_data(kind: EntryKind, alert_id: u32, data: &[u8]) -> Vec<u8> {
        let mut buf = [0u8; 512];
        encode(
            &mut buf,
            &EntryFields {
                kind,
                entry_id: 0,
                chunk_index: 1,
                chunk_count: 1,
                alert_id,
                session_id: b"s",
                device_name: b"d",
                device_name_width: 8,
                description: b"kept",
                description_width: 8,
                data,
            },
        )
        .unwrap()
        .as_bytes()
        .to_vec()
    }

    #[test]
    fn holds_one_alert_at_a_time() {
        let mut slot = RetainedSlot::new(1024);
        assert!(!slot.has_data());

        let first = entry_bytes(EntryKind::Alert, 1);
        let payload = entry_bytes(EntryKind::PayloadChunk, 1);
        let second = entry_bytes(EntryKind::Alert, 2);
        slot.write_alert(&decode(&first).unwrap()).unwrap();
        slot.write_payload(&decode(&payload).unwrap()).unwrap();
        slot.write_alert(&decode(&second).unwrap()).unwrap();
        assert!(slot.has_data());

        let mut buf = [0u8; 256];
        let len = slot.read_alert(&mut buf).unwrap().unwrap();
        assert_eq!(decode(&buf[..len]).unwrap().alert_id(), 2);
        assert_eq!(slot.read_payload(&mut buf).unwrap(), None);
    }

    #[test]
    fn payloads_follow_the_alert() {
        let mut slot = RetainedSlot::new(1024);
        let alert = entry_bytes(EntryKind::Alert, 4);
        let payload = entry_bytes(EntryKind::PayloadHeader, 4);
        slot.write_alert(&decode(&alert).unwrap()).unwrap();
        slot.write_payload(&decode(&payload).unwrap()).unwrap();

        let mut buf = [0u8; 256];
        assert!(slot.read_alert(&mut buf).unwrap().is_some());
        let len = slot.read_payload(&mut buf).unwrap().unwrap();
        assert_eq!(decode(&buf[..len]).unwrap().kind(), EntryKind::PayloadHeader);
        assert_eq!(slot.read_payload(&mut buf).unwrap(), None);

        slot.clear().unwrap();
        assert!(!slot.has_data());
        assert_eq!(slot.read_alert(&mut buf).unwrap(), None);
    }

    #[test]
    fn full_slot_rejects() {
        let mut slot = RetainedSlot::new(64);
        let alert = entry_bytes(EntryKind::Alert, 1);
        assert_eq!(slot.write_alert(&decode(&alert).unwrap()), Err(PortError::Full));
    }

    #[test]
    fn oversized_alert_keeps_the_previous_one() {
        let mut slot = RetainedSlot::new(160);
        let kept = entry_bytes(EntryKind::Alert, 1);
        slot.write_alert(&decode(&kept).unwrap()).unwrap();

        let oversized = entry_with_data(EntryKind::Alert, 2, &[9; 120]);
        assert_eq!(slot.write_alert(&decode(&oversized).unwrap()), Err(PortError::Full));

        assert!(slot.has_data());
        let mut buf = [0u8; 256];
        let len = slot.read_alert(&mut buf).unwrap().unwrap();
        assert_eq!(&buf[..len], kept.as_slice());
    }
}
