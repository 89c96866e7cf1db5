//! ## larm-core::ports
//! **Platform seams of the agent**
//!
//! ### Expectations:
//! - Every port call is synchronous and reports failure through [`PortError`]
//! - Read calls fill a caller buffer and return `Ok(None)` when nothing is left
//! - Entries handed to a port are fully validated and already framed

use larm_entry::Entry;

use crate::error::PortError;

/// Transport towards the collector.
pub trait CloudPort {
    fn send_alert(&mut self, entry: &Entry<'_>) -> Result<(), PortError>;
    fn send_payload(&mut self, entry: &Entry<'_>) -> Result<(), PortError>;
}

/// Persistent store for alerts that could not be sent, plus the session
/// record.
pub trait StoragePort {
    /// Stores an alert entry. With `overwrite` the port may evict the oldest
    /// data when full; otherwise it reports [`PortError::Full`].
    fn store_alert(&mut self, entry: &Entry<'_>, overwrite: bool) -> Result<(), PortError>;

    /// Stores a payload entry belonging to the last stored alert.
    fn store_payload(&mut self, entry: &Entry<'_>, overwrite: bool) -> Result<(), PortError>;

    /// Copies the next stored alert entry into `buf`.
    fn next_alert(&mut self, buf: &mut [u8]) -> Result<Option<usize>, PortError>;

    /// Copies the next stored payload entry of the given alert into `buf`.
    fn next_payload(
        &mut self,
        session_id: &[u8],
        alert_id: u32,
        buf: &mut [u8],
    ) -> Result<Option<usize>, PortError>;

    fn store_session(&mut self, record: &[u8]) -> Result<(), PortError>;
    fn load_session(&mut self, buf: &mut [u8]) -> Result<Option<usize>, PortError>;
}

/// Memory that survives a warm restart and holds at most one alert.
pub trait RetainedPort {
    fn write_alert(&mut self, entry: &Entry<'_>) -> Result<(), PortError>;
    fn write_payload(&mut self, entry: &Entry<'_>) -> Result<(), PortError>;
    fn read_alert(&mut self, buf: &mut [u8]) -> Result<Option<usize>, PortError>;
    fn read_payload(&mut self, buf: &mut [u8]) -> Result<Option<usize>, PortError>;
    fn clear(&mut self) -> Result<(), PortError>;
    fn has_data(&self) -> bool;
}

/// Scheduler queries used when describing a fault.
pub trait KernelPort {
    fn current_task_name(&self) -> &str;
}

/// Caller-supplied identity. Both calls write into `buf` and return the
/// number of bytes written; zero means the value is unavailable.
pub trait IdentityProvider {
    fn unique_session_id(&mut self, buf: &mut [u8]) -> Result<usize, PortError>;
    fn device_name(&mut self, buf: &mut [u8]) -> Result<usize, PortError>;
}

/// Identity provider built from two closures.
pub struct FnIdentity<S, D> {
    session_id: S,
    device_name: D,
}

impl<S, D> FnIdentity<S, D>
where
    S: FnMut(&mut [u8]) -> usize,
    D: FnMut(&mut [u8]) -> usize,
{
    pub fn new(session_id: S, device_name: D) -> Self {
        Self {
            session_id,
            device_name,
        }
    }
}

impl<S, D> IdentityProvider for FnIdentity<S, D>
where
    S: FnMut(&mut [u8]) -> usize,
    D: FnMut(&mut [u8]) -> usize,
{
    fn unique_session_id(&mut self, buf: &mut [u8]) -> Result<usize, PortError> {
        Ok((self.session_id)(buf))
    }

    fn device_name(&mut self, buf: &mut [u8]) -> Result<usize, PortError> {
        Ok((self.device_name)(buf))
    }
}

/// Receiver of framed entries during delivery and replay.
///
/// Closures taking an entry implement this trait directly.
pub trait EntrySink {
    fn on_alert(&mut self, entry: &Entry<'_>) -> Result<(), PortError>;
    fn on_payload(&mut self, entry: &Entry<'_>) -> Result<(), PortError>;
}

impl<F> EntrySink for F
where
    F: FnMut(&Entry<'_>) -> Result<(), PortError>,
{
    fn on_alert(&mut self, entry: &Entry<'_>) -> Result<(), PortError> {
        self(entry)
    }

    fn on_payload(&mut self, entry: &Entry<'_>) -> Result<(), PortError> {
        self(entry)
    }
}

/// The full set of ports an agent is built with.
pub struct Ports {
    pub cloud: Box<dyn CloudPort>,
    pub storage: Box<dyn StoragePort>,
    pub retained: Option<Box<dyn RetainedPort>>,
    pub kernel: Box<dyn KernelPort>,
    pub identity: Box<dyn IdentityProvider>,
}

impl Ports {
    pub fn new(
        cloud: impl CloudPort + 'static,
        storage: impl StoragePort + 'static,
        kernel: impl KernelPort + 'static,
        identity: impl IdentityProvider + 'static,
    ) -> Self {
        Self {
            cloud: Box::new(cloud),
            storage: Box::new(storage),
            retained: None,
            kernel: Box::new(kernel),
            identity: Box::new(identity),
        }
    }

    pub fn with_retained(mut self, retained: impl RetainedPort + 'static) -> Self {
        self.retained = Some(Box::new(retained));
        self
    }
}
