//! ## larm-entry::payload_header
//! **Record announcing an attachment ahead of its chunks**

use bytes::BufMut;

use crate::cursor::ByteCursor;
use crate::entry::ENDIANNESS_TAG;
use crate::error::RecordError;
use crate::record::ALERT_RECORD_VERSION;
use crate::trim_nul;

pub const PAYLOAD_START_MARKERS: [u8; 4] = [0x50, 0x44, 0x61, 0x50];
pub const PAYLOAD_END_MARKERS: [u8; 4] = [0x50, 0x61, 0x44, 0x50];
pub const PAYLOAD_FILENAME_WIDTH: usize = 16;
pub const PAYLOAD_HEADER_LEN: usize = 4 + 2 + 1 + 1 + 4 + PAYLOAD_FILENAME_WIDTH + 4 + 4;

/// Builds the payload header record for an attachment of `file_size` bytes.
pub fn encode_payload_header(filename: &[u8], file_size: u32) -> [u8; PAYLOAD_HEADER_LEN] {
    let mut out = [0u8; PAYLOAD_HEADER_LEN];
    let mut buf = &mut out[..];
    buf.put_slice(&PAYLOAD_START_MARKERS);
    buf.put_u16_le(ENDIANNESS_TAG);
    buf.put_u8(ALERT_RECORD_VERSION);
    buf.put_u8(PAYLOAD_FILENAME_WIDTH as u8);
    buf.put_u32_le(file_size);
    let len = filename.len().min(PAYLOAD_FILENAME_WIDTH);
    buf.put_slice(&filename[..len]);
    buf.put_bytes(0, PAYLOAD_FILENAME_WIDTH - len);
    buf.put_slice(&PAYLOAD_END_MARKERS);
    buf.put_u32_le(0);
    out
}

/// A decoded payload header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadHeader<'a> {
    pub version: u8,
    pub file_size: u32,
    filename: &'a [u8],
}

impl<'a> PayloadHeader<'a> {
    pub fn decode(data: &'a [u8]) -> Result<Self, RecordError> {
        let mut cursor = ByteCursor::new(data);
        if cursor.read_array::<4>()? != PAYLOAD_START_MARKERS {
            return Err(RecordError::BadStartMarkers);
        }
        if cursor.read_u16()? != ENDIANNESS_TAG {
            return Err(RecordError::EndiannessMismatch);
        }
        let version = cursor.read_u8()?;
        let filename_width = cursor.read_u8()?;
        let file_size = cursor.read_u32()?;
        let filename = cursor.take(usize::from(filename_width))?;
        if cursor.read_array::<4>()? != PAYLOAD_END_MARKERS {
            return Err(RecordError::BadEndMarkers);
        }
        let _checksum = cursor.read_u32()?;

        Ok(Self {
            version,
            file_size,
            filename,
        })
    }

    pub fn filename(&self) -> &'a [u8] {
        trim_nul(self.filename)
    }
}
