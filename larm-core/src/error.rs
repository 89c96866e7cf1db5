//! Error taxonomy of the reporting agent.

use larm_entry::{EntryError, RecordError};
use thiserror::Error;

/// Failure reported by a port implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    #[error("Port is unavailable")]
    Unavailable,
    #[error("Port storage is full")]
    Full,
    #[error("Port rejected the request: {0}")]
    Rejected(&'static str),
    #[error("Port I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for PortError {
    fn from(err: std::io::Error) -> Self {
        PortError::Io(err.to_string())
    }
}

/// Errors returned by agent operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Reporting is disabled")]
    Disabled,
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Unique session id could not be resolved")]
    SessionIdUnavailable,
    #[error("Device name could not be resolved")]
    DeviceNameUnavailable,
    #[error("Alert already holds the maximum of {0} symptoms")]
    SymptomsFull(usize),
    #[error("Alert already holds the maximum of {0} attachments")]
    AttachmentsFull(usize),
    #[error("Entry format violation: {0}")]
    Format(#[from] EntryError),
    #[error("Record format violation: {0}")]
    Record(#[from] RecordError),
    #[error("Port failure: {0}")]
    Port(#[from] PortError),
    #[error("No delivery attempt accepted the alert")]
    Undelivered,
}

/// Coarse classification used for retry and reporting decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Guard checks: disabled agent, bad arguments, missing identity.
    Precondition,
    /// Symptom, attachment or buffer limits.
    Capacity,
    /// A record failed validation.
    Format,
    /// A port could not take or return data.
    Port,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Disabled
            | Error::InvalidArgument(_)
            | Error::Config(_)
            | Error::SessionIdUnavailable
            | Error::DeviceNameUnavailable => ErrorKind::Precondition,
            Error::SymptomsFull(_) | Error::AttachmentsFull(_) => ErrorKind::Capacity,
            Error::Format(EntryError::BufferTooSmall { .. })
            | Error::Record(RecordError::BufferTooSmall { .. }) => ErrorKind::Capacity,
            Error::Format(_) | Error::Record(_) => ErrorKind::Format,
            Error::Port(_) | Error::Undelivered => ErrorKind::Port,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(Error::Disabled.kind(), ErrorKind::Precondition);
        assert_eq!(Error::SymptomsFull(8).kind(), ErrorKind::Capacity);
        assert_eq!(
            Error::from(EntryError::BadStartMarkers).kind(),
            ErrorKind::Format
        );
        assert_eq!(
            Error::from(EntryError::BufferTooSmall {
                needed: 10,
                capacity: 5
            })
            .kind(),
            ErrorKind::Capacity
        );
        assert_eq!(Error::from(PortError::Full).kind(), ErrorKind::Port);
        assert_eq!(Error::Undelivered.kind(), ErrorKind::Port);
    }
}
