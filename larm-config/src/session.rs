//! Session identity and strategy configuration.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

/// What the storage port is asked to do with undelivered alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageStrategy {
    /// Never store.
    #[default]
    Ignore,
    /// Store, evicting the oldest records when full.
    Overwrite,
    /// Store, rejecting new records when full.
    Skip,
}

/// Whether the cloud port may be used at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStrategy {
    Offline,
    #[default]
    Online,
}

/// When the unique session id is acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionIdStrategy {
    /// During agent initialization; initialization fails without one.
    OnStartup,
    /// Lazily, when the first alert needs it.
    #[default]
    OnAlert,
}

/// Session configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct SessionConfig {
    /// Product identifier written into every alert record.
    #[serde(default = "default_product_id")]
    #[validate(range(min = 1))]
    pub product_id: u32,

    /// Firmware version written into every alert record.
    #[serde(default = "default_firmware_version")]
    #[validate(length(min = 1, max = 240))]
    #[validate(custom(function = validation::validate_firmware_version))]
    pub firmware_version: String,

    #[serde(default)]
    pub storage_strategy: StorageStrategy,

    #[serde(default)]
    pub delivery_strategy: DeliveryStrategy,

    #[serde(default)]
    pub session_id_strategy: SessionIdStrategy,
}

fn default_product_id() -> u32 {
    1
}

fn default_firmware_version() -> String {
    "0.1.0".into()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            product_id: default_product_id(),
            firmware_version: default_firmware_version(),
            storage_strategy: StorageStrategy::default(),
            delivery_strategy: DeliveryStrategy::default(),
            session_id_strategy: SessionIdStrategy::default(),
        }
    }
}
