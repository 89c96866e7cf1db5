//! ## larm-ports::serial
//! **Entries as hex dumps on a text stream**
//!
//! ### Expectations:
//! - Each entry is framed by a begin and an end marker line
//! - Data lines carry at most 20 bytes as space-separated upper-case hex
//! - Other lines interleaved in the stream are ignored by the parser

use std::io::Write;

use larm_core::{CloudPort, PortError};
use larm_entry::Entry;
use thiserror::Error;

pub const DUMP_BEGIN: &str = "[[ DevAlert Data Begins ]]";
pub const DUMP_END_PREFIX: &str = "[[ DevAlert Data Ended.";
const DATA_PREFIX: &str = "[[ DATA:";
const DATA_SUFFIX: &str = "]]";
const BYTES_PER_LINE: usize = 20;
const MAX_ENTRY_SIZE: usize = 0xFFFF;

/// Cloud port printing every entry to a writer, typically a UART or stdout.
#[derive(Debug)]
pub struct SerialCloud<W: Write> {
    out: W,
}

impl<W: Write> SerialCloud<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn upload(&mut self, entry: &Entry<'_>) -> Result<(), PortError> {
        let data = entry.as_bytes();
        if data.len() > MAX_ENTRY_SIZE {
            return Err(PortError::Rejected("entry too large for a serial dump"));
        }

        write!(self.out, "\n{DUMP_BEGIN}\n")?;
        for line in data.chunks(BYTES_PER_LINE) {
            write!(self.out, "{DATA_PREFIX}")?;
            for byte in line {
                write!(self.out, " {byte:02X}")?;
            }
            writeln!(self.out, " {DATA_SUFFIX}")?;
        }
        writeln!(self.out, "{DUMP_END_PREFIX} Checksum: 0 ]]")?;
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write> CloudPort for SerialCloud<W> {
    fn send_alert(&mut self, entry: &Entry<'_>) -> Result<(), PortError> {
        self.upload(entry)
    }

    fn send_payload(&mut self, entry: &Entry<'_>) -> Result<(), PortError> {
        self.upload(entry)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SerialDumpError {
    #[error("Invalid hex on line {line}: {source}")]
    Hex {
        line: usize,
        #[source]
        source: hex::FromHexError,
    },
    #[error("Dump starting on line {0} has no end marker")]
    Unterminated(usize),
    #[error("Data line {0} outside a dump")]
    StrayData(usize),
}

/// Extracts the raw entries from a captured serial log.
pub fn parse_serial_dump(text: &str) -> Result<Vec<Vec<u8>>, SerialDumpError> {
    let mut entries = Vec::new();
    let mut current: Option<(usize, Vec<u8>)> = None;

    for (index, line) in text.lines().enumerate() {
        let number = index + 1;
        let line = line.trim();
        if line == DUMP_BEGIN {
            if let Some((start, _)) = current {
                return Err(SerialDumpError::Unterminated(start));
            }
            current = Some((number, Vec::new()));
        } else if line.starts_with(DUMP_END_PREFIX) {
            if let Some((_, bytes)) = current.take() {
                entries.push(bytes);
            }
        } else if let Some(rest) = line.strip_prefix(DATA_PREFIX) {
            let Some((_, bytes)) = current.as_mut() else {
                return Err(SerialDumpError::StrayData(number));
            };
            let digits: String = rest
                .trim_end_matches(DATA_SUFFIX)
                .split_whitespace()
                .collect();
            let decoded = hex::decode(&digits).map_err(|source| SerialDumpError::Hex {
                line: number,
                source,
            })?;
            bytes.extend_from_slice(&decoded);
        }
    }

    match current {
        Some((start, _)) => Err(SerialDumpError::Unterminated(start)),
        None => Ok(entries),
    }
}
