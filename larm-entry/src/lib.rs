//! # Larm Entry Framing
//!
//! Self-describing binary records shared by the agent's transport, storage
//! and replay paths.
//!
//! An entry is a 32-byte little-endian header, four variable sections
//! (session id, device name, description, data) and a 4-byte footer. The
//! header records every section length, so a reader never assumes the field
//! widths of the firmware that wrote the record.

pub mod cursor;
pub mod entry;
mod error;
pub mod payload_header;
pub mod record;
pub mod topic;

pub use cursor::ByteCursor;
pub use entry::{
    decode, decode_payload_for, encode, encoded_len, Entry, EntryFields, EntryHeader, EntryKind,
    ENTRY_VERSION, FOOTER_LEN, HEADER_LEN, PAYLOAD_DESCRIPTION_WIDTH, SESSION_ID_WIDTH,
};
pub use error::{EntryError, RecordError};
pub use payload_header::{encode_payload_header, PayloadHeader, PAYLOAD_HEADER_LEN};
pub use record::{
    encode_alert_record, record_checksum, AlertFields, AlertRecord, RecordLayout, Symptom,
    ALERT_RECORD_VERSION,
};
pub use topic::mqtt_topic;

/// Rounds `len` up to the next multiple of eight, the field alignment used
/// for every variable-width text field.
pub const fn align8(len: usize) -> usize {
    (len + 7) & !7
}

/// Returns `field` up to (not including) its first NUL byte.
pub fn trim_nul(field: &[u8]) -> &[u8] {
    match field.iter().position(|&b| b == 0) {
        Some(end) => &field[..end],
        None => field,
    }
}
