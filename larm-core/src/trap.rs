//! ## larm-core::trap
//! **Alerts for traps and hard faults**
//!
//! ### Expectations:
//! - Capturing registers and memory is the caller's job; this module only reports
//! - Descriptions are formatted into a fixed buffer and may be truncated
//! - A crash dump that cannot be attached does not stop the alert

use std::fmt::{self, Write};

use heapless::String;
use tracing::{error, instrument, warn};

use crate::agent::Agent;
use crate::alert::AlertDraft;
use crate::codes::{alert_type, symptom};
use crate::dispatch::Attempt;
use crate::error::Error;

pub const CRASH_DUMP_NAME: &str = "crash.dmp";

const DESCRIPTION_BUFFER: usize = 128;
const NAME_CHECKSUM_LEN: usize = 32;

/// A software trap raised at a known source location.
#[derive(Debug, Clone, Copy)]
pub struct Trap<'a> {
    pub alert_type: u32,
    pub message: &'a str,
    /// Source path; only the part after the last `/` is reported.
    pub file: &'a str,
    pub line: u32,
    pub stack_pointer: u32,
    pub dump: Option<&'a [u8]>,
    /// Deliver through the cloud as well, not only storage and retained memory.
    pub online: bool,
}

/// A hard fault captured by the exception handler.
#[derive(Debug, Clone, Copy)]
pub struct FaultFrame<'a> {
    pub cfsr: u32,
    pub stack_pointer: u32,
    pub dump: Option<&'a [u8]>,
    pub online: bool,
}

/// Sum of the bytes of `name`, up to 32 bytes or the first NUL.
pub fn name_checksum(name: &[u8]) -> u32 {
    name.iter()
        .take(NAME_CHECKSUM_LEN)
        .take_while(|&&b| b != 0)
        .fold(0u32, |sum, &b| sum.wrapping_add(u32::from(b)))
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Formats into a fixed buffer, keeping whatever fits up to `limit` bytes
/// and cutting at a char boundary.
struct Truncating {
    text: String<DESCRIPTION_BUFFER>,
    limit: usize,
    truncated: bool,
}

impl Truncating {
    fn new(limit: usize) -> Self {
        Self {
            text: String::new(),
            limit: limit.min(DESCRIPTION_BUFFER),
            truncated: false,
        }
    }
}

impl Write for Truncating {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = self.limit.saturating_sub(self.text.len());
        let mut end = s.len().min(room);
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        if end < s.len() {
            self.truncated = true;
        }
        self.text.push_str(&s[..end]).map_err(|_| fmt::Error)
    }
}

fn describe(limit: usize, args: fmt::Arguments<'_>) -> String<DESCRIPTION_BUFFER> {
    let mut out = Truncating::new(limit);
    if out.write_fmt(args).is_err() || out.truncated {
        warn!(limit = out.limit, "Description truncated");
    }
    out.text
}

fn add_symptoms(draft: &mut AlertDraft<'_, '_>, symptoms: &[(u32, u32)]) {
    for &(id, value) in symptoms {
        if let Err(err) = draft.add_symptom(id, value) {
            warn!(id, error = %err, "Symptom not added");
        }
    }
}

impl Agent {
    #[instrument(skip_all, fields(alert_type = trap.alert_type, line = trap.line))]
    pub fn report_trap(&mut self, trap: &Trap<'_>) -> Result<Attempt, Error> {
        let file = file_name(trap.file);
        let description = describe(
            self.limits.description_max_len,
            format_args!("{} at {}:{}", trap.message, file, trap.line),
        );

        let task = name_checksum(self.ports.kernel.current_task_name().as_bytes());
        let mut draft = self.begin(trap.alert_type, &description)?;
        add_symptoms(
            &mut draft,
            &[
                (symptom::CURRENT_TASK, task),
                (symptom::STACKPTR, trap.stack_pointer),
                (symptom::FILE, name_checksum(file.as_bytes())),
                (symptom::LINE, trap.line),
            ],
        );

        if let Some(dump) = trap.dump {
            if let Err(err) = draft.add_attachment(CRASH_DUMP_NAME, dump) {
                error!(error = %err, "Crash dump not attached");
            }
        }

        let outcome = if trap.online {
            draft.end()
        } else {
            draft.end_offline()
        };
        if let Err(err) = &outcome {
            warn!(error = %err, "Trap alert not delivered");
        }
        outcome
    }

    #[instrument(skip_all, fields(cfsr = frame.cfsr))]
    pub fn report_fault(&mut self, frame: &FaultFrame<'_>) -> Result<Attempt, Error> {
        let description = describe(
            self.limits.description_max_len,
            format_args!("Hard fault exception (CFSR reg: 0x{:08X})", frame.cfsr),
        );

        let task = name_checksum(self.ports.kernel.current_task_name().as_bytes());
        let mut draft = self.begin(alert_type::HARDFAULT, &description)?;
        add_symptoms(
            &mut draft,
            &[
                (symptom::CURRENT_TASK, task),
                (symptom::STACKPTR, frame.stack_pointer),
                (symptom::ARM_SCB_FCSR, frame.cfsr),
            ],
        );

        if let Some(dump) = frame.dump {
            if let Err(err) = draft.add_attachment(CRASH_DUMP_NAME, dump) {
                error!(error = %err, "Crash dump not attached");
            }
        }

        let outcome = if frame.online {
            draft.end()
        } else {
            draft.end_offline()
        };
        if let Err(err) = &outcome {
            warn!(error = %err, "Fault alert not delivered");
        }
        outcome
    }
}
