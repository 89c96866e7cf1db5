//! # larm-core
//!
//! On-device alert reporting: build an alert with symptoms and attachments,
//! then deliver it through the cloud, persistent storage or retained memory,
//! and replay whatever was stored once a connection is back.
//!
//! ### Expectations:
//! - One [`Agent`] per device, driven from a single thread of control
//! - No allocation on the alert path once the agent is built
//! - Every failure is a typed [`Error`]; nothing panics on bad input
//!
//! ### Key Submodules:
//! - `agent`: the context object and its limits
//! - `alert`: the alert under construction
//! - `dispatch`: send, store, retain
//! - `replay`: draining stored and retained alerts
//! - `ports`: platform seams
//! - `trap`: alerts for traps and hard faults

pub mod agent;
pub mod alert;
pub mod codes;
pub mod dispatch;
pub mod error;
pub mod ports;
pub mod replay;
pub mod session;
pub mod trap;

#[cfg(test)]
mod testing;

pub mod prelude {
    pub use crate::agent::{Agent, Limits};
    pub use crate::alert::{AlertDraft, Attachment};
    pub use crate::codes::{alert_type, symptom, StatusCode};
    pub use crate::dispatch::{Attempt, EndTypes};
    pub use crate::error::{Error, ErrorKind, PortError};
    pub use crate::ports::*;
    pub use crate::trap::{FaultFrame, Trap};
}

pub use agent::{Agent, Limits};
pub use alert::{AlertDraft, Attachment};
pub use codes::StatusCode;
pub use dispatch::{Attempt, EndTypes};
pub use error::{Error, ErrorKind, PortError};
pub use ports::{
    CloudPort, EntrySink, FnIdentity, IdentityProvider, KernelPort, Ports, RetainedPort,
    StoragePort,
};
pub use session::{Session, SessionId};
pub use trap::{name_checksum, FaultFrame, Trap, CRASH_DUMP_NAME};
