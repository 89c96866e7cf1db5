//! ## larm-entry::record
//! **Binary alert record carried as the data of an Alert entry**
//!
//! The record stores its own field widths (firmware version, description,
//! symptom capacity), so a collector can decode records written by firmware
//! built with different limits.

use bytes::BufMut;

use crate::cursor::ByteCursor;
use crate::entry::ENDIANNESS_TAG;
use crate::error::RecordError;
use crate::trim_nul;

/// Version 1 was the initial layout, 2 added the product id, 3 is current.
pub const ALERT_RECORD_VERSION: u8 = 3;
pub const ALERT_START_MARKERS: [u8; 4] = [0x50, 0x44, 0x66, 0x6D];
pub const ALERT_END_MARKERS: [u8; 4] = [0x6D, 0x66, 0x44, 0x50];
const FIXED_LEN: usize = 4 + 2 + 6 + 4 + 4 + 4 + 4;
const SYMPTOM_LEN: usize = 8;

/// A numeric diagnostic fact attached to an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Symptom {
    pub id: u32,
    pub value: u32,
}

/// Field widths of an alert record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    pub max_symptoms: u8,
    pub firmware_version_width: u8,
    pub description_width: u8,
}

impl RecordLayout {
    pub const fn encoded_len(&self) -> usize {
        FIXED_LEN
            + self.max_symptoms as usize * SYMPTOM_LEN
            + self.firmware_version_width as usize
            + self.description_width as usize
    }
}

/// Content of an alert record to be written.
#[derive(Debug, Clone, Copy)]
pub struct AlertFields<'a> {
    pub product: u32,
    pub alert_type: u32,
    pub symptoms: &'a [Symptom],
    pub firmware_version: &'a [u8],
    pub description: &'a [u8],
    pub checksum: u32,
}

/// Checksum over an encoded alert record.
///
/// Always zero: the field is reserved in the format but collectors do not
/// verify it yet.
pub fn record_checksum(_record: &[u8]) -> u32 {
    0
}

/// Writes an alert record into `out`, returning the number of bytes used.
///
/// Text fields are truncated to the layout widths and NUL padded; unused
/// symptom slots are zeroed.
pub fn encode_alert_record(
    out: &mut [u8],
    layout: RecordLayout,
    fields: &AlertFields<'_>,
) -> Result<usize, RecordError> {
    let max = usize::from(layout.max_symptoms);
    if fields.symptoms.len() > max {
        return Err(RecordError::TooManySymptoms {
            count: fields.symptoms.len(),
            max,
        });
    }
    let total = layout.encoded_len();
    if total > out.len() {
        return Err(RecordError::BufferTooSmall {
            needed: total,
            capacity: out.len(),
        });
    }

    let mut buf = &mut out[..total];
    buf.put_slice(&ALERT_START_MARKERS);
    buf.put_u16_le(ENDIANNESS_TAG);
    buf.put_u8(ALERT_RECORD_VERSION);
    buf.put_u8(layout.firmware_version_width);
    buf.put_u8(layout.max_symptoms);
    buf.put_u8(fields.symptoms.len() as u8);
    buf.put_u8(layout.description_width);
    buf.put_u8(0);
    buf.put_u32_le(fields.product);
    buf.put_u32_le(fields.alert_type);
    for symptom in fields.symptoms {
        buf.put_u32_le(symptom.id);
        buf.put_u32_le(symptom.value);
    }
    buf.put_bytes(0, (max - fields.symptoms.len()) * SYMPTOM_LEN);
    put_text(&mut buf, fields.firmware_version, layout.firmware_version_width);
    put_text(&mut buf, fields.description, layout.description_width);
    buf.put_slice(&ALERT_END_MARKERS);
    buf.put_u32_le(fields.checksum);

    Ok(total)
}

/// Text fields keep one byte for the terminating NUL.
fn put_text<B: BufMut>(buf: &mut B, text: &[u8], width: u8) {
    let width = usize::from(width);
    let len = text.len().min(width.saturating_sub(1));
    buf.put_slice(&text[..len]);
    buf.put_bytes(0, width - len);
}

/// A decoded alert record borrowed from entry data.
#[derive(Debug, Clone, Copy)]
pub struct AlertRecord<'a> {
    pub version: u8,
    pub product: u32,
    pub alert_type: u32,
    pub max_symptoms: u8,
    pub symptom_count: u8,
    pub checksum: u32,
    symptoms: &'a [u8],
    firmware_version: &'a [u8],
    description: &'a [u8],
}

impl<'a> AlertRecord<'a> {
    pub fn decode(data: &'a [u8]) -> Result<Self, RecordError> {
        let mut cursor = ByteCursor::new(data);
        if cursor.read_array::<4>()? != ALERT_START_MARKERS {
            return Err(RecordError::BadStartMarkers);
        }
        if cursor.read_u16()? != ENDIANNESS_TAG {
            return Err(RecordError::EndiannessMismatch);
        }
        let version = cursor.read_u8()?;
        let firmware_version_width = cursor.read_u8()?;
        let max_symptoms = cursor.read_u8()?;
        let symptom_count = cursor.read_u8()?;
        let description_width = cursor.read_u8()?;
        let _reserved = cursor.read_u8()?;
        let product = cursor.read_u32()?;
        let alert_type = cursor.read_u32()?;

        if symptom_count > max_symptoms {
            return Err(RecordError::TooManySymptoms {
                count: usize::from(symptom_count),
                max: usize::from(max_symptoms),
            });
        }

        let symptoms = cursor.take(usize::from(max_symptoms) * SYMPTOM_LEN)?;
        let firmware_version = cursor.take(usize::from(firmware_version_width))?;
        let description = cursor.take(usize::from(description_width))?;
        if cursor.read_array::<4>()? != ALERT_END_MARKERS {
            return Err(RecordError::BadEndMarkers);
        }
        let checksum = cursor.read_u32()?;

        Ok(Self {
            version,
            product,
            alert_type,
            max_symptoms,
            symptom_count,
            checksum,
            symptoms,
            firmware_version,
            description,
        })
    }

    /// Recorded symptoms in insertion order.
    pub fn symptoms(&self) -> impl Iterator<Item = Symptom> + 'a {
        self.symptoms
            .chunks_exact(SYMPTOM_LEN)
            .take(usize::from(self.symptom_count))
            .map(|raw| Symptom {
                id: u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
                value: u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]),
            })
    }

    pub fn firmware_version(&self) -> &'a [u8] {
        trim_nul(self.firmware_version)
    }

    pub fn description(&self) -> &'a [u8] {
        trim_nul(self.description)
    }
}
