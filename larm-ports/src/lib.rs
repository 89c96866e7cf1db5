//! # larm-ports
//!
//! Reference implementations of the agent's platform seams, usable on a
//! host and as templates for a board support package.
//!
//! ### Key Submodules:
//! - `serial`: cloud port printing hex dumps, plus the matching parser
//! - `ring`: flash-style storage in a fixed region
//! - `directory`: storage as files on a filesystem
//! - `retained`: retained memory holding a single alert
//! - `kernel`: task names without an RTOS

pub mod directory;
pub mod kernel;
pub mod retained;
pub mod ring;
pub mod serial;

pub use directory::DirectoryStorage;
pub use kernel::GenericKernel;
pub use retained::RetainedSlot;
pub use ring::RingStorage;
pub use serial::{parse_serial_dump, SerialCloud, SerialDumpError};
