//! Alert type, symptom and status codes understood by the collector.
//!
//! Callers may use other numeric codes; these are the ones the collector
//! renders by name.

/// Alert type codes.
pub mod alert_type {
    pub const ASSERT_FAILED: u32 = 1;
    pub const MALLOC_FAILED: u32 = 2;
    pub const HARDFAULT: u32 = 3;
    pub const MANUAL_TRACE: u32 = 4;
    pub const OVERLOAD: u32 = 5;
    pub const BAD_MESSAGE: u32 = 6;
    pub const HEARTBEAT: u32 = 7;
    pub const STACK_CHK_FAILED: u32 = 8;
}

/// Symptom id codes.
pub mod symptom {
    pub const CURRENT_TASK: u32 = 1;
    pub const FILE: u32 = 2;
    pub const FUNCTION: u32 = 3;
    pub const LINE: u32 = 4;
    pub const PC: u32 = 5;
    pub const STACKPTR: u32 = 6;
    pub const ARM_SCB_FCSR: u32 = 7;
    pub const HARDFAULT_REASON: u32 = 8;
}

/// Sticky diagnostic status of a session. The first error set wins until
/// the agent is rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum StatusCode {
    #[default]
    NotInitialized = 0,
    Ok = 1,
    TooSmallPayloadSize = 2,
    TooSmallFirmwareVersionBuffer = 3,
    MaxSymptomsExceeded = 4,
    NonvolatileDataAlreadyPresent = 5,
    GetUniqueSessionIdFailed = 6,
}

impl StatusCode {
    pub const fn code(self) -> u32 {
        self as u32
    }
}
