//! Capacities and field widths.
//!
//! These values size the buffers an agent allocates once at construction:
//! - Symptom and attachment slots of the alert record
//! - Text field widths inside entries and alert records
//! - The shared entry scratch buffer

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

/// Record limits.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct LimitsConfig {
    /// Symptoms one alert can carry.
    #[serde(default = "default_max_symptoms")]
    #[validate(range(min = 1, max = 32))]
    pub max_symptoms: usize,

    /// Attachments one alert can carry.
    #[serde(default = "default_max_attachments")]
    #[validate(range(min = 1, max = 16))]
    pub max_attachments: usize,

    /// Largest attachment slice carried by one chunk entry (bytes).
    #[serde(default = "default_max_chunk_size")]
    #[validate(range(min = 16, max = 65535))]
    pub max_chunk_size: usize,

    /// Longest alert description kept; longer text is truncated.
    #[serde(default = "default_description_max_len")]
    #[validate(range(min = 1, max = 240))]
    pub description_max_len: usize,

    /// Longest device name kept.
    #[serde(default = "default_device_name_max_len")]
    #[validate(range(min = 8, max = 248))]
    pub device_name_max_len: usize,

    /// Longest firmware version string kept.
    #[serde(default = "default_firmware_version_max_len")]
    #[validate(range(min = 8, max = 240))]
    pub firmware_version_max_len: usize,

    /// Scratch buffer size; derived from the other limits when unset.
    #[serde(default)]
    #[validate(range(min = 128, max = 1048576))]
    pub scratch_buffer_size: Option<usize>,
}

fn default_max_symptoms() -> usize {
    8
}

fn default_max_attachments() -> usize {
    8
}

fn default_max_chunk_size() -> usize {
    1000
}

fn default_description_max_len() -> usize {
    64
}

fn default_device_name_max_len() -> usize {
    32
}

fn default_firmware_version_max_len() -> usize {
    64
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_symptoms: default_max_symptoms(),
            max_attachments: default_max_attachments(),
            max_chunk_size: default_max_chunk_size(),
            description_max_len: default_description_max_len(),
            device_name_max_len: default_device_name_max_len(),
            firmware_version_max_len: default_firmware_version_max_len(),
            scratch_buffer_size: None,
        }
    }
}
