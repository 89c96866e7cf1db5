//! Error types for entry and record decoding.

use thiserror::Error;

/// Errors raised while framing or un-framing an entry.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EntryError {
    #[error("Insufficient data to read the entry header")]
    InsufficientData,
    #[error("Entry needs {needed} bytes but the buffer holds {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },
    #[error("Entry start markers do not match")]
    BadStartMarkers,
    #[error("Entry end markers do not match")]
    BadEndMarkers,
    #[error("Entry was written with the opposite byte order")]
    EndiannessMismatch,
    #[error("Unknown entry kind 0x{0:04X}")]
    UnknownKind(u16),
    #[error("Entry version {0} is newer than supported")]
    UnsupportedVersion(u16),
    #[error("Invalid chunk index {index} of {count}")]
    InvalidChunkIndex { index: u16, count: u16 },
    #[error("Entry description must not be empty")]
    EmptyDescription,
    #[error("Entry data must not be empty")]
    EmptyData,
    #[error("Field of {len} bytes does not fit the format")]
    FieldTooLong { len: usize },
    #[error("Entry is not a payload entry")]
    NotAPayload,
    #[error("Entry is not an alert entry")]
    NotAnAlert,
    #[error("Entry belongs to alert {found}, expected {expected}")]
    ForeignAlert { expected: u32, found: u32 },
    #[error("Entry belongs to another session")]
    ForeignSession,
}

/// Errors raised while encoding or decoding the records carried as entry data.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("Insufficient data to read the record")]
    InsufficientData,
    #[error("Record needs {needed} bytes but the buffer holds {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },
    #[error("Record start markers do not match")]
    BadStartMarkers,
    #[error("Record end markers do not match")]
    BadEndMarkers,
    #[error("Record was written with the opposite byte order")]
    EndiannessMismatch,
    #[error("Record carries {count} symptoms but only {max} fit")]
    TooManySymptoms { count: usize, max: usize },
}

impl From<EntryError> for RecordError {
    fn from(err: EntryError) -> Self {
        match err {
            EntryError::BufferTooSmall { needed, capacity } => {
                RecordError::BufferTooSmall { needed, capacity }
            }
            _ => RecordError::InsufficientData,
        }
    }
}
