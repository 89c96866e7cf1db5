//! MQTT topic naming for entries published to the collector.

use crate::entry::{Entry, EntryKind};

/// Builds the topic an entry is published on:
/// `<prefix>DevAlert/<device>/<session>/<alert id>/<chunk>-<count>_<suffix>`.
pub fn mqtt_topic(prefix: &str, entry: &Entry<'_>) -> String {
    let device = String::from_utf8_lossy(entry.device_name());
    let session = String::from_utf8_lossy(entry.session_id());
    let base = format!(
        "{prefix}DevAlert/{device}/{session}/{}/{}-{}",
        entry.alert_id(),
        entry.chunk_index(),
        entry.chunk_count()
    );
    match entry.kind() {
        EntryKind::Alert => format!("{base}_da_header"),
        EntryKind::PayloadHeader => format!("{base}_da_payload{}_header", entry.entry_id()),
        EntryKind::PayloadChunk => format!("{base}_da_payload{}", entry.entry_id()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{encode, EntryFields};

    fn topic_for(kind: EntryKind, entry_id: u16, index: u16, count: u16) -> String {
        let mut buf = [0u8; 256];
        let entry = encode(
            &mut buf,
            &EntryFields {
                kind,
                entry_id,
                chunk_index: index,
                chunk_count: count,
                alert_id: 12,
                session_id: b"s1",
                device_name: b"dev",
                device_name_width: 8,
                description: b"d",
                description_width: 8,
                data: b"x",
            },
        )
        .unwrap();
        mqtt_topic("$aws/rules/DevAlertRule/", &entry)
    }

    #[test]
    fn topics_follow_entry_kind() {
        assert_eq!(
            topic_for(EntryKind::Alert, 0, 1, 1),
            "$aws/rules/DevAlertRule/DevAlert/dev/s1/12/1-1_da_header"
        );
        assert_eq!(
            topic_for(EntryKind::PayloadHeader, 2, 1, 1),
            "$aws/rules/DevAlertRule/DevAlert/dev/s1/12/1-1_da_payload2_header"
        );
        assert_eq!(
            topic_for(EntryKind::PayloadChunk, 2, 3, 4),
            "$aws/rules/DevAlertRule/DevAlert/dev/s1/12/3-4_da_payload2"
        );
    }
}
