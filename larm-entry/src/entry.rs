//! ## larm-entry::entry
//! **Entry encoder and validating decoder**
//!
//! Entries are written into a caller-owned scratch buffer and read back as
//! zero-copy views over it. Decoding validates markers, kind, version and
//! chunk indices before any section is exposed; section offsets always come
//! from the lengths recorded in the header.
//!
//! ### Layout:
//! - `0..4`    start markers
//! - `4..6`    endianness tag
//! - `6..8`    format version
//! - `8..10`   entry kind
//! - `10..12`  entry id
//! - `12..14`  chunk index (1-based)
//! - `14..16`  chunk count
//! - `16..20`  alert id
//! - `20..28`  session id, device name, description lengths and a reserved word
//! - `28..32`  data length
//! - sections, then the end markers

use bytes::BufMut;

use crate::cursor::ByteCursor;
use crate::error::EntryError;
use crate::trim_nul;

pub const HEADER_LEN: usize = 32;
pub const FOOTER_LEN: usize = 4;
pub const START_MARKERS: [u8; 4] = [0xD1, 0xD2, 0xD3, 0xD4];
pub const END_MARKERS: [u8; 4] = [0xD4, 0xD3, 0xD2, 0xD1];
pub const ENDIANNESS_TAG: u16 = 0x0FF0;
/// Newest entry format this crate writes and the newest it accepts.
pub const ENTRY_VERSION: u16 = 1;
/// Width of the session id section in every entry this crate writes.
pub const SESSION_ID_WIDTH: usize = 32;
/// Width of the description section in payload header and chunk entries.
pub const PAYLOAD_DESCRIPTION_WIDTH: usize = 16;

/// The three record kinds carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum EntryKind {
    Alert = 0x1512,
    PayloadHeader = 0x4618,
    PayloadChunk = 0x8371,
}

impl EntryKind {
    pub const fn code(self) -> u16 {
        self as u16
    }

    pub fn is_payload(self) -> bool {
        matches!(self, EntryKind::PayloadHeader | EntryKind::PayloadChunk)
    }
}

impl TryFrom<u16> for EntryKind {
    type Error = EntryError;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            0x1512 => Ok(EntryKind::Alert),
            0x4618 => Ok(EntryKind::PayloadHeader),
            0x8371 => Ok(EntryKind::PayloadChunk),
            other => Err(EntryError::UnknownKind(other)),
        }
    }
}

/// Everything needed to write one entry.
#[derive(Debug, Clone, Copy)]
pub struct EntryFields<'a> {
    pub kind: EntryKind,
    pub entry_id: u16,
    pub chunk_index: u16,
    pub chunk_count: u16,
    pub alert_id: u32,
    pub session_id: &'a [u8],
    pub device_name: &'a [u8],
    /// Section width for the device name; longer names are truncated.
    pub device_name_width: usize,
    pub description: &'a [u8],
    /// Section width for the description; longer text is truncated.
    pub description_width: usize,
    pub data: &'a [u8],
}

/// Decoded fixed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    pub version: u16,
    pub kind: EntryKind,
    pub entry_id: u16,
    pub chunk_index: u16,
    pub chunk_count: u16,
    pub alert_id: u32,
    pub session_id_len: u16,
    pub device_name_len: u16,
    pub description_len: u16,
    pub data_len: u32,
}

impl EntryHeader {
    /// Size of the complete record described by this header.
    pub fn total_len(&self) -> usize {
        HEADER_LEN
            + usize::from(self.session_id_len)
            + usize::from(self.device_name_len)
            + usize::from(self.description_len)
            + self.data_len as usize
            + FOOTER_LEN
    }
}

/// A validated entry borrowed from the buffer it was decoded from.
#[derive(Debug, Clone, Copy)]
pub struct Entry<'a> {
    bytes: &'a [u8],
    header: EntryHeader,
    session_id: &'a [u8],
    device_name: &'a [u8],
    description: &'a [u8],
    data: &'a [u8],
}

impl<'a> Entry<'a> {
    pub fn header(&self) -> &EntryHeader {
        &self.header
    }

    pub fn kind(&self) -> EntryKind {
        self.header.kind
    }

    pub fn version(&self) -> u16 {
        self.header.version
    }

    pub fn entry_id(&self) -> u16 {
        self.header.entry_id
    }

    pub fn chunk_index(&self) -> u16 {
        self.header.chunk_index
    }

    pub fn chunk_count(&self) -> u16 {
        self.header.chunk_count
    }

    pub fn alert_id(&self) -> u32 {
        self.header.alert_id
    }

    /// Session id without its NUL padding.
    pub fn session_id(&self) -> &'a [u8] {
        trim_nul(self.session_id)
    }

    /// The full session id section, padding included.
    pub fn session_id_field(&self) -> &'a [u8] {
        self.session_id
    }

    pub fn device_name(&self) -> &'a [u8] {
        trim_nul(self.device_name)
    }

    pub fn description(&self) -> &'a [u8] {
        trim_nul(self.description)
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// The raw record, header to end markers.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Size of an entry written with the given section widths.
pub fn encoded_len(device_name_width: usize, description_width: usize, data_len: usize) -> usize {
    HEADER_LEN + SESSION_ID_WIDTH + device_name_width + description_width + data_len + FOOTER_LEN
}

/// Writes an entry at the start of `buf` and returns a view of it.
///
/// The size is checked against `buf` before anything is written, so a
/// failed call leaves the buffer untouched.
pub fn encode<'b>(buf: &'b mut [u8], fields: &EntryFields<'_>) -> Result<Entry<'b>, EntryError> {
    if fields.description.is_empty() {
        return Err(EntryError::EmptyDescription);
    }
    if fields.data.is_empty() {
        return Err(EntryError::EmptyData);
    }
    if fields.chunk_index == 0 || fields.chunk_index > fields.chunk_count {
        return Err(EntryError::InvalidChunkIndex {
            index: fields.chunk_index,
            count: fields.chunk_count,
        });
    }

    let device_name_len = width_u16(fields.device_name_width)?;
    let description_len = width_u16(fields.description_width)?;
    let data_len = u32::try_from(fields.data.len()).map_err(|_| EntryError::FieldTooLong {
        len: fields.data.len(),
    })?;

    let total = encoded_len(
        fields.device_name_width,
        fields.description_width,
        fields.data.len(),
    );
    if total > buf.len() {
        return Err(EntryError::BufferTooSmall {
            needed: total,
            capacity: buf.len(),
        });
    }

    let record = &mut buf[..total];
    {
        let mut out = &mut record[..];
        out.put_slice(&START_MARKERS);
        out.put_u16_le(ENDIANNESS_TAG);
        out.put_u16_le(ENTRY_VERSION);
        out.put_u16_le(fields.kind.code());
        out.put_u16_le(fields.entry_id);
        out.put_u16_le(fields.chunk_index);
        out.put_u16_le(fields.chunk_count);
        out.put_u32_le(fields.alert_id);
        out.put_u16_le(SESSION_ID_WIDTH as u16);
        out.put_u16_le(device_name_len);
        out.put_u16_le(description_len);
        out.put_u16_le(0);
        out.put_u32_le(data_len);
        put_padded(&mut out, fields.session_id, SESSION_ID_WIDTH);
        put_padded(&mut out, fields.device_name, fields.device_name_width);
        put_padded(&mut out, fields.description, fields.description_width);
        out.put_slice(fields.data);
        out.put_slice(&END_MARKERS);
    }

    decode(record)
}

/// Validates and decodes the entry at the start of `buf`.
pub fn decode(buf: &[u8]) -> Result<Entry<'_>, EntryError> {
    if buf.len() < HEADER_LEN + FOOTER_LEN {
        return Err(EntryError::InsufficientData);
    }

    let mut cursor = ByteCursor::new(buf);
    if cursor.read_array::<4>()? != START_MARKERS {
        return Err(EntryError::BadStartMarkers);
    }
    if cursor.read_u16()? != ENDIANNESS_TAG {
        return Err(EntryError::EndiannessMismatch);
    }

    let version = cursor.read_u16()?;
    let kind_code = cursor.read_u16()?;
    let entry_id = cursor.read_u16()?;
    let chunk_index = cursor.read_u16()?;
    let chunk_count = cursor.read_u16()?;
    let alert_id = cursor.read_u32()?;
    let session_id_len = cursor.read_u16()?;
    let device_name_len = cursor.read_u16()?;
    let description_len = cursor.read_u16()?;
    let _reserved = cursor.read_u16()?;
    let data_len = cursor.read_u32()?;

    let total = HEADER_LEN as u64
        + u64::from(session_id_len)
        + u64::from(device_name_len)
        + u64::from(description_len)
        + u64::from(data_len)
        + FOOTER_LEN as u64;
    if total > buf.len() as u64 {
        return Err(EntryError::BufferTooSmall {
            needed: usize::try_from(total).unwrap_or(usize::MAX),
            capacity: buf.len(),
        });
    }

    let session_id = cursor.take(usize::from(session_id_len))?;
    let device_name = cursor.take(usize::from(device_name_len))?;
    let description = cursor.take(usize::from(description_len))?;
    let data = cursor.take(data_len as usize)?;
    if cursor.read_array::<4>()? != END_MARKERS {
        return Err(EntryError::BadEndMarkers);
    }

    let kind = EntryKind::try_from(kind_code)?;
    if version > ENTRY_VERSION {
        return Err(EntryError::UnsupportedVersion(version));
    }
    if chunk_index == 0 || chunk_index > chunk_count {
        return Err(EntryError::InvalidChunkIndex {
            index: chunk_index,
            count: chunk_count,
        });
    }

    Ok(Entry {
        bytes: &buf[..cursor.position()],
        header: EntryHeader {
            version,
            kind,
            entry_id,
            chunk_index,
            chunk_count,
            alert_id,
            session_id_len,
            device_name_len,
            description_len,
            data_len,
        },
        session_id,
        device_name,
        description,
        data,
    })
}

/// Decodes a payload entry and checks that it belongs to the given alert.
///
/// The session id is compared byte for byte up to [`SESSION_ID_WIDTH`],
/// stopping at the first NUL of `session_id`.
pub fn decode_payload_for<'a>(
    buf: &'a [u8],
    session_id: &[u8],
    alert_id: u32,
) -> Result<Entry<'a>, EntryError> {
    let entry = decode(buf)?;
    if !entry.kind().is_payload() {
        return Err(EntryError::NotAPayload);
    }
    if entry.alert_id() != alert_id {
        return Err(EntryError::ForeignAlert {
            expected: alert_id,
            found: entry.alert_id(),
        });
    }
    if !session_matches(entry.session_id_field(), session_id) {
        return Err(EntryError::ForeignSession);
    }
    Ok(entry)
}

fn session_matches(stored: &[u8], wanted: &[u8]) -> bool {
    for i in 0..SESSION_ID_WIDTH {
        let want = wanted.get(i).copied().unwrap_or(0);
        let have = stored.get(i).copied().unwrap_or(0);
        if want != have {
            return false;
        }
        if want == 0 {
            break;
        }
    }
    true
}

fn width_u16(width: usize) -> Result<u16, EntryError> {
    u16::try_from(width).map_err(|_| EntryError::FieldTooLong { len: width })
}

fn put_padded<B: BufMut>(out: &mut B, src: &[u8], width: usize) {
    let len = src.len().min(width);
    out.put_slice(&src[..len]);
    out.put_bytes(0, width - len);
}
