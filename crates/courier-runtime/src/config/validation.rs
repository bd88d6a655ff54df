//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{CourierConfig, DispatchConfig, LogOutput, LoggingConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &CourierConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_dispatch_config(&config.dispatch)?;
    Ok(())
}

/// Validates logging settings.
fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.file_path is required when logging.output is \"file\"",
        ));
    }

    for module in logging.filters.keys() {
        if module.trim().is_empty() {
            return Err(ConfigError::validation(
                "logging.filters keys must name a module",
            ));
        }
        if module.contains(['=', ',', ' ']) {
            return Err(ConfigError::validation(format!(
                "Invalid module name in logging.filters: {module:?}"
            )));
        }
    }

    Ok(())
}

/// Validates dispatch settings.
fn validate_dispatch_config(dispatch: &DispatchConfig) -> ConfigResult<()> {
    for handler in dispatch.scopes.keys() {
        if handler.trim().is_empty() {
            return Err(ConfigError::validation(
                "dispatch.scopes keys must name a handler type",
            ));
        }
        if handler.chars().any(char::is_whitespace) {
            return Err(ConfigError::validation(format!(
                "Handler type name cannot contain whitespace: {handler:?}"
            )));
        }
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use courier_core::Scope;

    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&CourierConfig::default()).is_ok());
    }

    #[test]
    fn file_output_needs_path() {
        let mut config = CourierConfig::default();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());

        config.logging.file_path = Some(PathBuf::from("logs/courier.log"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn bad_filter_key_is_rejected() {
        let mut config = CourierConfig::default();
        config
            .logging
            .filters
            .insert("courier_core=debug".into(), LogLevel::Trace);
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn blank_scope_override_is_rejected() {
        let mut config = CourierConfig::default();
        config.dispatch.scopes.insert("  ".into(), Scope::Shared);
        assert!(validate_config(&config).is_err());
    }
}
