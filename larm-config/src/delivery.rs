//! Delivery plan for finished alerts.
//!
//! `end` walks the enabled attempts in the fixed order send, store, retain
//! and stops at the first one that takes the alert.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

/// Delivery attempts made when an alert is ended.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct DeliveryConfig {
    /// Try the cloud port first.
    #[serde(default = "default_true")]
    pub send: bool,

    /// Fall back to the storage port.
    #[serde(default = "default_true")]
    pub store: bool,

    /// Fall back to retained memory.
    #[serde(default = "default_true")]
    pub retain: bool,

    /// Prefix for MQTT topics built from entries.
    #[serde(default)]
    #[validate(length(max = 128))]
    pub mqtt_prefix: String,
}

fn default_true() -> bool {
    true
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            send: default_true(),
            store: default_true(),
            retain: default_true(),
            mqtt_prefix: String::new(),
        }
    }
}
