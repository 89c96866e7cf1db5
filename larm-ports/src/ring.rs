//! ## larm-ports::ring
//! **Flash-style alert storage in a fixed byte region**
//!
//! ### Expectations:
//! - Records are `{ type u32, size u32 }` followed by the entry, padded to 8 bytes
//! - Unwritten space reads as erased (`0xFF`)
//! - With overwrite the oldest alerts are evicted whole; without it a full region rejects
//! - Records are consumed as they are read back

use std::sync::Arc;

use larm_core::{PortError, StoragePort};
use larm_entry::{align8, decode_payload_for, Entry};
use parking_lot::Mutex;
use tracing::{debug, warn};

pub const ALERT_RECORD: u32 = 0x3456_1842;
pub const PAYLOAD_RECORD: u32 = 0x8271_3124;

const RECORD_HEADER: usize = 8;
const ERASED: u8 = 0xFF;
const SESSION_SLOT: usize = 32;

#[derive(Debug)]
struct Region {
    bytes: Vec<u8>,
    read: usize,
    write: usize,
    session: Option<Vec<u8>>,
}

impl Region {
    fn record_at(&self, offset: usize) -> Option<(u32, usize)> {
        if offset >= self.write {
            return None;
        }
        let header = self.bytes.get(offset..offset + RECORD_HEADER)?;
        let kind = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let size = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        if kind != ALERT_RECORD && kind != PAYLOAD_RECORD {
            return None;
        }
        Some((kind, size))
    }

    fn entry_at(&self, offset: usize, size: usize) -> Option<&[u8]> {
        let start = offset + RECORD_HEADER;
        self.bytes.get(start..start + size)
    }

    fn erase(&mut self) {
        self.bytes.fill(ERASED);
        self.read = 0;
        self.write = 0;
    }

    /// Moves unread records to the start of the region.
    fn compact(&mut self) {
        if self.read == 0 {
            return;
        }
        let live = self.write - self.read;
        self.bytes.copy_within(self.read..self.write, 0);
        self.bytes[live..].fill(ERASED);
        self.read = 0;
        self.write = live;
    }

    /// Drops the oldest alert together with the payloads stored after it.
    fn evict_oldest(&mut self) -> bool {
        let Some((_, size)) = self.record_at(self.read) else {
            return false;
        };
        let mut next = self.read + align8(RECORD_HEADER + size);
        while let Some((kind, size)) = self.record_at(next) {
            if kind == ALERT_RECORD {
                break;
            }
            next += align8(RECORD_HEADER + size);
        }
        debug!(freed = next - self.read, "Evicted oldest stored alert");
        self.read = next;
        true
    }

    fn store(&mut self, kind: u32, entry: &Entry<'_>, overwrite: bool) -> Result<(), PortError> {
        let data = entry.as_bytes();
        let record_len = align8(RECORD_HEADER + data.len());
        if record_len > self.bytes.len() {
            return Err(PortError::Full);
        }
        if self.read == self.write {
            self.erase();
        }

        while self.write + record_len > self.bytes.len() {
            self.compact();
            if self.write + record_len <= self.bytes.len() {
                break;
            }
            if !overwrite || !self.evict_oldest() {
                warn!(needed = record_len, "Alert storage is full");
                return Err(PortError::Full);
            }
        }

        let size = u32::try_from(data.len()).map_err(|_| PortError::Rejected("entry too large"))?;
        let at = self.write;
        self.bytes[at..at + 4].copy_from_slice(&kind.to_le_bytes());
        self.bytes[at + 4..at + 8].copy_from_slice(&size.to_le_bytes());
        self.bytes[at + RECORD_HEADER..at + RECORD_HEADER + data.len()].copy_from_slice(data);
        self.write += record_len;
        Ok(())
    }

    fn take(&mut self, offset: usize, size: usize, buf: &mut [u8]) -> Result<Option<usize>, PortError> {
        let entry = self
            .entry_at(offset, size)
            .ok_or(PortError::Rejected("record runs past the region"))?;
        let dst = buf
            .get_mut(..size)
            .ok_or(PortError::Rejected("buffer too small"))?;
        dst.copy_from_slice(entry);
        self.read = offset + align8(RECORD_HEADER + size);
        Ok(Some(size))
    }
}

/// A fixed-size storage region. Clones share the same region, the way a
/// flash partition outlives the code using it.
#[derive(Debug, Clone)]
pub struct RingStorage {
    region: Arc<Mutex<Region>>,
}

impl RingStorage {
    pub fn new(capacity: usize) -> Self {
        Self {
            region: Arc::new(Mutex::new(Region {
                bytes: vec![ERASED; capacity],
                read: 0,
                write: 0,
                session: None,
            })),
        }
    }

    pub fn capacity(&self) -> usize {
        self.region.lock().bytes.len()
    }

    /// Bytes held by records not yet read back.
    pub fn pending_bytes(&self) -> usize {
        let region = self.region.lock();
        region.write - region.read
    }

    pub fn is_empty(&self) -> bool {
        self.pending_bytes() == 0
    }

    pub fn reset(&self) {
        self.region.lock().erase();
    }
}

impl StoragePort for RingStorage {
    fn store_alert(&mut self, entry: &Entry<'_>, overwrite: bool) -> Result<(), PortError> {
        self.region.lock().store(ALERT_RECORD, entry, overwrite)
    }

    fn store_payload(&mut self, entry: &Entry<'_>, overwrite: bool) -> Result<(), PortError> {
        self.region.lock().store(PAYLOAD_RECORD, entry, overwrite)
    }

    fn next_alert(&mut self, buf: &mut [u8]) -> Result<Option<usize>, PortError> {
        let mut region = self.region.lock();
        loop {
            let offset = region.read;
            match region.record_at(offset) {
                Some((ALERT_RECORD, size)) => return region.take(offset, size, buf),
                Some((_, size)) => {
                    debug!("Skipping payload without its alert");
                    region.read = offset + align8(RECORD_HEADER + size);
                }
                None => return Ok(None),
            }
        }
    }

    fn next_payload(
        &mut self,
        session_id: &[u8],
        alert_id: u32,
        buf: &mut [u8],
    ) -> Result<Option<usize>, PortError> {
        let mut region = self.region.lock();
        let offset = region.read;
        match region.record_at(offset) {
            Some((PAYLOAD_RECORD, size)) => {
                let belongs = region
                    .entry_at(offset, size)
                    .is_some_and(|raw| decode_payload_for(raw, session_id, alert_id).is_ok());
                if belongs {
                    region.take(offset, size, buf)
                } else {
                    Ok(None)
                }
            }
            _ => Ok(None),
        }
    }

    fn store_session(&mut self, record: &[u8]) -> Result<(), PortError> {
        if record.len() > SESSION_SLOT {
            return Err(PortError::Rejected("session record too large"));
        }
        self.region.lock().session = Some(record.to_vec());
        Ok(())
    }

    fn load_session(&mut self, buf: &mut [u8]) -> Result<Option<usize>, PortError> {
        let region = self.region.lock();
        let Some(record) = &region.session else {
            return Ok(None);
        };
        let dst = buf
            .get_mut(..record.len())
            .ok_or(PortError::Rejected("buffer too small"))?;
        dst.copy_from_slice(record);
        Ok(Some(record.len()))
    }
}

#[cfg(test)]
mod tests {
    use larm_entry::{decode, encode, EntryFields, EntryKind};
    use proptest::prelude::*;

    use super::*;

    fn frame(buf: &mut [u8], kind: EntryKind, alert_id: u32, data: &[u8]) -> usize {
        encode(
            buf,
            &EntryFields {
                kind,
                entry_id: u16::from(kind != EntryKind::Alert),
                chunk_index: 1,
                chunk_count: 1,
                alert_id,
                session_id: b"boot-1",
                device_name: b"dev",
                device_name_width: 8,
                description: b"ring",
                description_width: 8,
                data,
            },
        )
        .unwrap()
        .size()
    }

    fn store(storage: &mut RingStorage, kind: EntryKind, alert_id: u32, overwrite: bool) -> Result<(), PortError> {
        let mut buf = [0u8; 256];
        let len = frame(&mut buf, kind, alert_id, &[alert_id as u8; 24]);
        let entry = decode(&buf[..len]).unwrap();
        match kind {
            EntryKind::Alert => storage.store_alert(&entry, overwrite),
            _ => storage.store_payload(&entry, overwrite),
        }
    }

    fn drain(storage: &mut RingStorage) -> Vec<(u32, usize)> {
        let mut out = Vec::new();
        let mut buf = [0u8; 256];
        while let Some(len) = storage.next_alert(&mut buf).unwrap() {
            let alert_id = decode(&buf[..len]).unwrap().alert_id();
            let mut payloads = 0;
            while storage.next_payload(b"boot-1", alert_id, &mut buf).unwrap().is_some() {
                payloads += 1;
            }
            out.push((alert_id, payloads));
        }
        out
    }

    #[test]
    fn records_are_aligned_and_typed() {
        let mut storage = RingStorage::new(1024);
        store(&mut storage, EntryKind::Alert, 1, false).unwrap();
        let region = storage.region.lock();
        assert_eq!(region.write % 8, 0);
        assert_eq!(region.record_at(0).map(|(kind, _)| kind), Some(ALERT_RECORD));
        assert_eq!(region.bytes[region.write], ERASED);
    }

    #[test]
    fn alerts_come_back_with_their_payloads() {
        let mut storage = RingStorage::new(2048);
        store(&mut storage, EntryKind::Alert, 1, false).unwrap();
        store(&mut storage, EntryKind::PayloadHeader, 1, false).unwrap();
        store(&mut storage, EntryKind::PayloadChunk, 1, false).unwrap();
        store(&mut storage, EntryKind::Alert, 2, false).unwrap();

        assert_eq!(drain(&mut storage), vec![(1, 2), (2, 0)]);
        assert!(storage.is_empty());
    }

    #[test]
    fn skip_rejects_when_full() {
        let mut storage = RingStorage::new(300);
        store(&mut storage, EntryKind::Alert, 1, false).unwrap();
        store(&mut storage, EntryKind::Alert, 2, false).unwrap();
        assert_eq!(store(&mut storage, EntryKind::Alert, 3, false), Err(PortError::Full));
        assert_eq!(drain(&mut storage), vec![(1, 0), (2, 0)]);
    }

    #[test]
    fn overwrite_evicts_oldest_alert() {
        let mut storage = RingStorage::new(300);
        store(&mut storage, EntryKind::Alert, 1, true).unwrap();
        store(&mut storage, EntryKind::Alert, 2, true).unwrap();
        store(&mut storage, EntryKind::Alert, 3, true).unwrap();
        assert_eq!(drain(&mut storage), vec![(2, 0), (3, 0)]);
    }

    #[test]
    fn session_slot_is_separate() {
        let mut storage = RingStorage::new(512);
        let mut buf = [0u8; 16];
        assert_eq!(storage.load_session(&mut buf).unwrap(), None);
        storage.store_session(&[1, 2, 3, 4]).unwrap();
        assert_eq!(storage.load_session(&mut buf).unwrap(), Some(4));
        assert!(storage.store_session(&[0u8; 40]).is_err());
        assert!(storage.is_empty());
    }

    #[test]
    fn clones_share_the_region() {
        let mut writer = RingStorage::new(1024);
        let mut reader = writer.clone();
        store(&mut writer, EntryKind::Alert, 9, false).unwrap();
        assert_eq!(drain(&mut reader), vec![(9, 0)]);
    }

    proptest! {
        #[test]
        fn overwrite_keeps_newest(count in 1u32..30) {
            let mut storage = RingStorage::new(600);
            for id in 1..=count {
                store(&mut storage, EntryKind::Alert, id, true).unwrap();
            }
            let ids: Vec<u32> = drain(&mut storage).into_iter().map(|(id, _)| id).collect();
            prop_assert!(!ids.is_empty());
            prop_assert_eq!(*ids.last().unwrap(), count);
            prop_assert!(ids.windows(2).all(|w| w[1] == w[0] + 1));
        }
    }
}
