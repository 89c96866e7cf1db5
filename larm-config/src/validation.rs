//! Custom validation functions for configuration.

use validator::ValidationError;

/// Firmware versions are printable tokens such as `1.4.0-rc1+g3f2a`.
pub fn validate_firmware_version(version: &str) -> Result<(), ValidationError> {
    let re = regex::Regex::new("^[0-9A-Za-z._+-]+$")
        .map_err(|_| ValidationError::new("invalid_regex"))?;
    if re.is_match(version) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_firmware_version"))
    }
}

/// Validate a default log filter level.
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let re = regex::Regex::new("^(trace|debug|info|warn|error|off)$")
        .map_err(|_| ValidationError::new("invalid_regex"))?;
    if re.is_match(&level.to_lowercase()) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn firmware_versions() {
        assert!(validate_firmware_version("1.4.0-rc1+g3f2a").is_ok());
        assert!(validate_firmware_version("1.0 beta").is_err());
        assert!(validate_firmware_version("").is_err());
    }

    #[test]
    fn log_levels() {
        assert!(validate_log_level("INFO").is_ok());
        assert!(validate_log_level("verbose").is_err());
    }
}
