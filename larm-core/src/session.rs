//! ## larm-core::session
//! **Identity, enable flag and alert counter of one boot**
//!
//! ### Expectations:
//! - The session id is resolved at most once and never regenerated
//! - A persisted opt-out survives restarts until explicitly overridden
//! - The status code is sticky: the first diagnostic set after `Ok` wins
//! - Alert ids are strictly increasing within a session, starting at 1

use heapless::Vec;
use larm_config::{DeliveryStrategy, SessionConfig, SessionIdStrategy, StorageStrategy};
use larm_entry::SESSION_ID_WIDTH;
use tracing::{debug, info, warn};

use crate::codes::StatusCode;
use crate::error::Error;
use crate::ports::{IdentityProvider, StoragePort};

/// Largest device name any configuration may ask for.
pub const DEVICE_NAME_CAP: usize = 248;

pub const SESSION_RECORD_VERSION: u32 = 1;
pub const SESSION_RECORD_LEN: usize = 8;

const ENABLED_MARK: u32 = 0x1515_2725;
const DISABLED_MARK: u32 = 0x7128_9203;

/// Session id copied out of the scratch buffer during replay.
pub type SessionId = Vec<u8, SESSION_ID_WIDTH>;
pub type DeviceName = Vec<u8, DEVICE_NAME_CAP>;

/// Enable preference as found in persistent storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredPreference {
    Enabled,
    Disabled,
    Unknown,
}

impl StoredPreference {
    /// Decodes a persisted session record. Short blobs and unknown versions
    /// carry no preference.
    pub fn decode(raw: &[u8]) -> Self {
        let (Some(version), Some(mark)) = (read_u32(raw, 0), read_u32(raw, 4)) else {
            return StoredPreference::Unknown;
        };
        match version {
            1 => match mark {
                ENABLED_MARK => StoredPreference::Enabled,
                DISABLED_MARK => StoredPreference::Disabled,
                _ => StoredPreference::Unknown,
            },
            _ => StoredPreference::Unknown,
        }
    }

    fn load(storage: &mut dyn StoragePort) -> Self {
        let mut raw = [0u8; 2 * SESSION_RECORD_LEN];
        match storage.load_session(&mut raw) {
            Ok(Some(len)) => Self::decode(&raw[..len.min(raw.len())]),
            Ok(None) => StoredPreference::Unknown,
            Err(err) => {
                debug!(error = %err, "Session record unreadable");
                StoredPreference::Unknown
            }
        }
    }
}

/// Encodes the current session record version.
pub fn encode_session_record(enabled: bool) -> [u8; SESSION_RECORD_LEN] {
    let mark = if enabled { ENABLED_MARK } else { DISABLED_MARK };
    let mut raw = [0u8; SESSION_RECORD_LEN];
    raw[..4].copy_from_slice(&SESSION_RECORD_VERSION.to_le_bytes());
    raw[4..].copy_from_slice(&mark.to_le_bytes());
    raw
}

fn read_u32(raw: &[u8], at: usize) -> Option<u32> {
    let bytes = raw.get(at..at + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[derive(Debug)]
pub struct Session {
    enabled: bool,
    status: StatusCode,
    storage_strategy: StorageStrategy,
    delivery_strategy: DeliveryStrategy,
    session_id_strategy: SessionIdStrategy,
    session_id: SessionId,
    device_name: DeviceName,
    device_name_max_len: usize,
    alert_counter: u32,
}

impl Session {
    pub(crate) fn new(config: &SessionConfig, device_name_max_len: usize) -> Self {
        Self {
            enabled: false,
            status: StatusCode::Ok,
            storage_strategy: config.storage_strategy,
            delivery_strategy: config.delivery_strategy,
            session_id_strategy: config.session_id_strategy,
            session_id: SessionId::new(),
            device_name: DeviceName::new(),
            device_name_max_len: device_name_max_len.min(DEVICE_NAME_CAP),
            alert_counter: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Records a diagnostic. Only the first one after `Ok` is kept.
    pub fn set_status(&mut self, status: StatusCode) {
        if self.status == StatusCode::Ok && status != StatusCode::Ok {
            debug!(status = ?status, "Session status set");
            self.status = status;
        }
    }

    pub(crate) fn enable(
        &mut self,
        override_disabled: bool,
        storage: &mut dyn StoragePort,
    ) -> Result<(), Error> {
        if self.enabled {
            return Ok(());
        }

        match StoredPreference::load(storage) {
            StoredPreference::Enabled => {}
            StoredPreference::Disabled if !override_disabled => {
                info!("Reporting stays disabled by persisted preference");
                return Err(Error::Disabled);
            }
            StoredPreference::Disabled | StoredPreference::Unknown => {
                if let Err(err) = storage.store_session(&encode_session_record(true)) {
                    warn!(error = %err, "Could not persist enabled preference");
                }
            }
        }

        self.enabled = true;
        info!("Reporting enabled");
        Ok(())
    }

    pub(crate) fn disable(
        &mut self,
        remember: bool,
        storage: &mut dyn StoragePort,
    ) -> Result<(), Error> {
        self.enabled = false;
        info!(remember, "Reporting disabled");

        if remember && StoredPreference::load(storage) != StoredPreference::Disabled {
            storage.store_session(&encode_session_record(false))?;
        }
        Ok(())
    }

    pub(crate) fn generate_alert_id(&mut self) -> u32 {
        self.alert_counter = self.alert_counter.wrapping_add(1);
        self.alert_counter
    }

    /// Id of the most recently started alert, 0 before the first one.
    pub fn alert_id(&self) -> u32 {
        self.alert_counter
    }

    /// Cached session id; empty until resolved.
    pub fn session_id(&self) -> &[u8] {
        &self.session_id
    }

    /// Cached device name; empty until resolved or set.
    pub fn device_name(&self) -> &[u8] {
        &self.device_name
    }

    pub(crate) fn resolve_session_id(
        &mut self,
        identity: &mut dyn IdentityProvider,
    ) -> Result<&[u8], Error> {
        if !self.session_id.is_empty() {
            return Ok(&self.session_id);
        }

        // One byte of the field stays free for the terminating NUL.
        let mut raw = [0u8; SESSION_ID_WIDTH];
        let limit = SESSION_ID_WIDTH - 1;
        let written = identity.unique_session_id(&mut raw[..limit]);
        match written {
            Ok(len) if len > 0 && len <= limit => {
                self.session_id = SessionId::from_slice(&raw[..len])
                    .map_err(|_| Error::SessionIdUnavailable)?;
                debug!(
                    session_id = %String::from_utf8_lossy(&self.session_id),
                    "Session id resolved"
                );
                Ok(&self.session_id)
            }
            other => {
                warn!(result = ?other, "Unique session id unavailable");
                self.set_status(StatusCode::GetUniqueSessionIdFailed);
                Err(Error::SessionIdUnavailable)
            }
        }
    }

    pub(crate) fn resolve_device_name(
        &mut self,
        identity: &mut dyn IdentityProvider,
    ) -> Result<&[u8], Error> {
        if !self.device_name.is_empty() {
            return Ok(&self.device_name);
        }

        let mut raw = [0u8; DEVICE_NAME_CAP];
        let limit = self.device_name_max_len;
        match identity.device_name(&mut raw[..limit]) {
            Ok(len) if len > 0 && len <= limit => {
                self.device_name = DeviceName::from_slice(&raw[..len])
                    .map_err(|_| Error::DeviceNameUnavailable)?;
                Ok(&self.device_name)
            }
            other => {
                warn!(result = ?other, "Device name unavailable");
                Err(Error::DeviceNameUnavailable)
            }
        }
    }

    pub(crate) fn set_device_name(&mut self, name: &[u8]) -> Result<(), Error> {
        if name.is_empty() {
            return Err(Error::InvalidArgument("device name is empty"));
        }
        if name.len() > self.device_name_max_len {
            return Err(Error::InvalidArgument("device name is too long"));
        }
        self.device_name =
            DeviceName::from_slice(name).map_err(|_| Error::InvalidArgument("device name is too long"))?;
        Ok(())
    }

    pub fn storage_strategy(&self) -> StorageStrategy {
        self.storage_strategy
    }

    pub fn set_storage_strategy(&mut self, strategy: StorageStrategy) {
        self.storage_strategy = strategy;
    }

    pub fn delivery_strategy(&self) -> DeliveryStrategy {
        self.delivery_strategy
    }

    pub fn set_delivery_strategy(&mut self, strategy: DeliveryStrategy) {
        self.delivery_strategy = strategy;
    }

    pub fn session_id_strategy(&self) -> SessionIdStrategy {
        self.session_id_strategy
    }
}
