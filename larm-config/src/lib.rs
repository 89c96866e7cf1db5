//! # Larm Configuration System
//!
//! Hierarchical configuration for the reporting agent: record limits,
//! session identity and strategies, the delivery plan and telemetry.
//!
//! ## Features
//! - **Validation**: every limit is range checked before an agent is built
//! - **Layering**: defaults, YAML files and `LARM_*` environment overrides
//! - **Consistency**: cross-field checks between limits and session values

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod delivery;
mod error;
mod limits;
mod session;
mod telemetry;
mod validation;

pub use delivery::DeliveryConfig;
pub use error::ConfigError;
pub use limits::LimitsConfig;
pub use session::{DeliveryStrategy, SessionConfig, SessionIdStrategy, StorageStrategy};
pub use telemetry::TelemetryConfig;

/// Top-level configuration container for a reporting agent.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct LarmConfig {
    /// Capacities and field widths of alerts and entries.
    #[serde(default)]
    #[validate(nested)]
    pub limits: LimitsConfig,

    /// Product identity and strategies.
    #[serde(default)]
    #[validate(nested)]
    pub session: SessionConfig,

    /// Which delivery attempts `end` makes.
    #[serde(default)]
    #[validate(nested)]
    pub delivery: DeliveryConfig,

    /// Logging and metrics.
    #[serde(default)]
    #[validate(nested)]
    pub telemetry: TelemetryConfig,
}

impl LarmConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default values
    /// 2. `config/larm.yaml`, if present
    /// 3. `config/<LARM_ENV>.yaml`, if present (`LARM_ENV` defaults to `device`)
    /// 4. `LARM_*` environment variables, nested with `__`
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(LarmConfig::default()));

        if Path::new("config/larm.yaml").exists() {
            figment = figment.merge(Yaml::file("config/larm.yaml"));
        }

        let env = std::env::var("LARM_ENV").unwrap_or_else(|_| "device".into());
        let env_file = format!("config/{}.yaml", env);
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        figment
            .merge(Env::prefixed("LARM_").split("__"))
            .extract()
            .map_err(ConfigError::from)
            .and_then(Self::checked)
    }

    /// Load configuration from a specific file, with environment overrides.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(path)));
        }

        Figment::from(Serialized::defaults(LarmConfig::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed("LARM_").split("__"))
            .extract()
            .map_err(ConfigError::from)
            .and_then(Self::checked)
    }

    /// Runs field validation and the cross-field checks.
    pub fn checked(self) -> Result<Self, ConfigError> {
        self.validate()?;
        if self.session.firmware_version.len() > self.limits.firmware_version_max_len {
            return Err(ConfigError::Inconsistent(format!(
                "firmware version '{}' is longer than firmware_version_max_len ({})",
                self.session.firmware_version, self.limits.firmware_version_max_len
            )));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn full_config_validation() {
        let config = LarmConfig::default();
        config.validate().expect("Default config should validate");
        assert!(config.checked().is_ok());
    }

    #[test]
    fn environment_override() {
        Jail::expect_with(|jail| {
            jail.set_env("LARM_LIMITS__MAX_SYMPTOMS", "12");
            jail.set_env("LARM_SESSION__STORAGE_STRATEGY", "overwrite");
            let config = LarmConfig::load().unwrap();
            assert_eq!(config.limits.max_symptoms, 12);
            assert_eq!(config.session.storage_strategy, StorageStrategy::Overwrite);
            Ok(())
        });
    }

    #[test]
    fn environment_is_restored_after_override() {
        Jail::expect_with(|jail| {
            jail.set_env("LARM_LIMITS__MAX_SYMPTOMS", "12");
            Ok(())
        });
        Jail::expect_with(|_| {
            let config = LarmConfig::load().unwrap();
            assert_eq!(config.limits.max_symptoms, LimitsConfig::default().max_symptoms);
            Ok(())
        });
    }

    #[test]
    fn load_from_yaml_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "larm.yaml",
                "limits:\n  max_chunk_size: 512\nsession:\n  product_id: 77\n  firmware_version: \"2.4.1\"\n  session_id_strategy: on_startup\ndelivery:\n  retain: false\n",
            )?;

            let config = LarmConfig::load_from_path("larm.yaml").unwrap();
            assert_eq!(config.limits.max_chunk_size, 512);
            assert_eq!(config.session.product_id, 77);
            assert_eq!(config.session.firmware_version, "2.4.1");
            assert_eq!(config.session.session_id_strategy, SessionIdStrategy::OnStartup);
            assert!(config.delivery.send);
            assert!(!config.delivery.retain);
            Ok(())
        });
    }

    #[test]
    fn missing_file_is_reported() {
        let err = LarmConfig::load_from_path("config/does-not-exist.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn out_of_range_limits_fail_validation() {
        let mut config = LarmConfig::default();
        config.limits.max_symptoms = 0;
        config.limits.max_chunk_size = 4;
        let err = config.checked().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("max_symptoms"));
        assert!(message.contains("max_chunk_size"));
    }

    #[test]
    fn cross_field_checks() {
        let mut config = LarmConfig::default();
        config.session.firmware_version = "1".repeat(config.limits.firmware_version_max_len + 1);
        assert!(matches!(config.checked(), Err(ConfigError::Inconsistent(_))));
    }
}
