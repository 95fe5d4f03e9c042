//! Configuration file loader.

use super::error::{ConfigError, ConfigResult};
use super::types::TeeConfig;
use super::validation::{DestinationValidator, SettingsValidator, Validator};
use std::path::Path;
use tracing::warn;

/// Configuration loader with validation support.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Validators to run on loaded configuration.
    validators: Vec<Box<dyn Validator>>,
}

impl ConfigLoader {
    /// Create a new configuration loader with no validators.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a loader with the built-in settings and destination validators.
    #[must_use]
    pub fn with_default_validators() -> Self {
        Self::new()
            .with_validator(SettingsValidator::new())
            .with_validator(DestinationValidator::new())
    }

    /// Add a validator to the loader.
    #[must_use]
    pub fn with_validator<V: Validator + 'static>(mut self, validator: V) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    /// Load and validate configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file does not exist
    /// - The file cannot be read
    /// - The TOML is malformed
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(&self, path: P) -> ConfigResult<TeeConfig> {
        let config = self.read_file(path)?;
        self.validate(&config)?;
        Ok(config)
    }

    /// Load and validate configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or validation fails.
    pub fn load_str(&self, content: &str) -> ConfigResult<TeeConfig> {
        let config: TeeConfig = toml::from_str(content)?;
        self.validate(&config)?;
        Ok(config)
    }

    /// Parse a configuration file without validating it.
    ///
    /// Used when command-line overrides still have to be applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable or malformed.
    pub fn read_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<TeeConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(toml::from_str(&content)?)
    }

    /// Validate a configuration against all registered validators.
    ///
    /// Warnings are logged; errors are joined into a single message.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoDestinations`] when no destination is
    /// configured, or [`ConfigError::ValidationError`] for anything else.
    pub fn validate(&self, config: &TeeConfig) -> ConfigResult<()> {
        if config.destinations.is_empty() {
            return Err(ConfigError::NoDestinations);
        }

        for validator in &self.validators {
            let result = validator.validate(config);

            for warning in result.warnings() {
                warn!(field = %warning.field, "{}", warning.message);
            }

            if !result.is_valid() {
                let errors: Vec<String> = result
                    .errors_only()
                    .iter()
                    .map(|e| e.to_string())
                    .collect();
                return Err(ConfigError::ValidationError(errors.join("; ")));
            }
        }
        Ok(())
    }
}
