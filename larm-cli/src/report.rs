//! Human-readable summaries of decoded entries.

use std::fmt::Write;

use larm_entry::{mqtt_topic, AlertRecord, Entry, EntryKind, PayloadHeader};

/// One summary block per entry: the header line, the MQTT topic, then the
/// decoded contents of the data section.
pub fn describe(entry: &Entry<'_>, prefix: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:?} alert={} entry={} chunk={}/{} size={}",
        entry.kind(),
        entry.alert_id(),
        entry.entry_id(),
        entry.chunk_index(),
        entry.chunk_count(),
        entry.size()
    );
    let _ = writeln!(out, "  topic: {}", mqtt_topic(prefix, entry));
    let _ = writeln!(
        out,
        "  session: {} device: {} description: {}",
        String::from_utf8_lossy(entry.session_id()),
        String::from_utf8_lossy(entry.device_name()),
        String::from_utf8_lossy(entry.description())
    );

    match entry.kind() {
        EntryKind::Alert => match AlertRecord::decode(entry.data()) {
            Ok(record) => {
                let _ = writeln!(
                    out,
                    "  type: {} product: 0x{:08X} firmware: {}",
                    record.alert_type,
                    record.product,
                    String::from_utf8_lossy(record.firmware_version())
                );
                let _ = writeln!(out, "  text: {}", String::from_utf8_lossy(record.description()));
                for symptom in record.symptoms() {
                    let _ = writeln!(out, "  symptom {}: 0x{:08X}", symptom.id, symptom.value);
                }
            }
            Err(err) => {
                let _ = writeln!(out, "  alert record unreadable: {err}");
            }
        },
        EntryKind::PayloadHeader => match PayloadHeader::decode(entry.data()) {
            Ok(header) => {
                let _ = writeln!(
                    out,
                    "  file: {} ({} bytes)",
                    String::from_utf8_lossy(header.filename()),
                    header.file_size
                );
            }
            Err(err) => {
                let _ = writeln!(out, "  payload header unreadable: {err}");
            }
        },
        EntryKind::PayloadChunk => {
            let data = entry.data();
            let preview = &data[..data.len().min(8)];
            let _ = writeln!(out, "  data: {} bytes, starts {}", data.len(), hex::encode(preview));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use larm_entry::{
        encode, encode_alert_record, encode_payload_header, AlertFields, EntryFields, RecordLayout,
        Symptom,
    };

    use super::*;

    fn frame<'b>(buf: &'b mut [u8], kind: EntryKind, description: &[u8], data: &[u8]) -> Entry<'b> {
        encode(
            buf,
            &EntryFields {
                kind,
                entry_id: u16::from(kind != EntryKind::Alert),
                chunk_index: 1,
                chunk_count: 1,
                alert_id: 12,
                session_id: b"0000000065f0a1b2",
                device_name: b"bench",
                device_name_width: 8,
                description,
                description_width: 16,
                data,
            },
        )
        .unwrap()
    }

    #[test]
    fn describes_alert_record() {
        let layout = RecordLayout {
            max_symptoms: 2,
            firmware_version_width: 8,
            description_width: 16,
        };
        let mut record = [0u8; 128];
        let len = encode_alert_record(
            &mut record,
            layout,
            &AlertFields {
                product: 0x10,
                alert_type: 3,
                symptoms: &[Symptom { id: 6, value: 0x2000_1FF0 }],
                firmware_version: b"1.0",
                description: b"Hard fault",
                checksum: 0,
            },
        )
        .unwrap();

        let mut buf = [0u8; 256];
        let entry = frame(&mut buf, EntryKind::Alert, b"Hard fault", &record[..len]);
        let text = describe(&entry, "fleet/");
        assert!(text.contains("topic: fleet/DevAlert/bench/0000000065f0a1b2/12/1-1_da_header"));
        assert!(text.contains("type: 3 product: 0x00000010 firmware: 1.0"));
        assert!(text.contains("text: Hard fault"));
        assert!(text.contains("symptom 6: 0x20001FF0"));
    }

    #[test]
    fn describes_payload_header() {
        let header = encode_payload_header(b"crash.dmp", 2500);
        let mut buf = [0u8; 256];
        let entry = frame(&mut buf, EntryKind::PayloadHeader, b"crash.dmp", &header);
        let text = describe(&entry, "");
        assert!(text.starts_with("PayloadHeader alert=12 entry=1 chunk=1/1"));
        assert!(text.contains("file: crash.dmp (2500 bytes)"));
        assert!(text.contains("topic: DevAlert/bench/0000000065f0a1b2/12/"));
    }

    #[test]
    fn describes_chunk_preview() {
        let mut buf = [0u8; 256];
        let entry = frame(&mut buf, EntryKind::PayloadChunk, b"crash.dmp", &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert!(describe(&entry, "").contains("data: 4 bytes, starts deadbeef"));
    }
}
