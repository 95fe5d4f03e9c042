//! Configuration validation system.

use super::types::{DestinationConfig, TeeConfig};

/// Largest payload a UDP datagram over IPv4 can carry.
const MAX_UDP_PAYLOAD: usize = 65507;

/// A single validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// Error message.
    pub message: String,
    /// Severity level.
    pub severity: ValidationSeverity,
}

impl ValidationError {
    /// Create a new error.
    pub fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: ValidationSeverity::Error,
        }
    }

    /// Create a new warning.
    pub fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: ValidationSeverity::Warning,
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Severity of validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationSeverity {
    /// Error - configuration is invalid.
    Error,
    /// Warning - configuration may have issues.
    Warning,
}

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    errors: Vec<ValidationError>,
}

impl ValidationResult {
    /// Create a new empty (valid) result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an error to the result.
    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Check if the validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self
            .errors
            .iter()
            .any(|e| e.severity == ValidationSeverity::Error)
    }

    /// Get all validation issues.
    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Get only errors (not warnings).
    #[must_use]
    pub fn errors_only(&self) -> Vec<&ValidationError> {
        self.errors
            .iter()
            .filter(|e| e.severity == ValidationSeverity::Error)
            .collect()
    }

    /// Get only warnings.
    #[must_use]
    pub fn warnings(&self) -> Vec<&ValidationError> {
        self.errors
            .iter()
            .filter(|e| e.severity == ValidationSeverity::Warning)
            .collect()
    }

    /// Merge another validation result into this one.
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
    }
}

/// Trait for configuration validators.
pub trait Validator: std::fmt::Debug + Send + Sync {
    /// Validate a configuration and return any errors.
    fn validate(&self, config: &TeeConfig) -> ValidationResult;
}

/// Checks the pipeline settings.
#[derive(Debug, Default)]
pub struct SettingsValidator;

impl SettingsValidator {
    /// Create a new settings validator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Validator for SettingsValidator {
    fn validate(&self, config: &TeeConfig) -> ValidationResult {
        let mut result = ValidationResult::new();
        let settings = &config.tee;

        if settings.listen_address.is_empty() {
            result.add_error(ValidationError::error(
                "tee.listen_address",
                "Listen address cannot be empty",
            ));
        } else if !has_port(&settings.bind_address()) {
            result.add_error(ValidationError::error(
                "tee.listen_address",
                format!("'{}' is not a host:port address", settings.listen_address),
            ));
        }

        if settings.max_datagram_size == 0 {
            result.add_error(ValidationError::error(
                "tee.max_datagram_size",
                "Maximum datagram size cannot be 0",
            ));
        } else if settings.max_datagram_size > MAX_UDP_PAYLOAD {
            result.add_error(ValidationError::warning(
                "tee.max_datagram_size",
                format!("Datagrams never exceed {MAX_UDP_PAYLOAD} bytes"),
            ));
        }

        if settings.recv_buffer_size < settings.max_datagram_size {
            result.add_error(ValidationError::warning(
                "tee.recv_buffer_size",
                "Receive buffer is smaller than one datagram",
            ));
        }

        if settings.queue_capacity == 0 {
            result.add_error(ValidationError::error(
                "tee.queue_capacity",
                "Queue capacity cannot be 0",
            ));
        }

        if settings.connect_timeout_ms == 0 {
            result.add_error(ValidationError::error(
                "tee.connect_timeout_ms",
                "Connect timeout cannot be 0",
            ));
        }

        result
    }
}

/// Checks that destinations exist, are addressable and compile.
#[derive(Debug, Default)]
pub struct DestinationValidator;

impl DestinationValidator {
    /// Create a new destination validator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn validate_one(index: usize, destination: &DestinationConfig) -> ValidationResult {
        let mut result = ValidationResult::new();
        let field = format!("destinations[{index}]");

        if !has_port(&destination.dial_address()) {
            result.add_error(ValidationError::error(
                format!("{field}.address"),
                format!("'{}' is not a host:port address", destination.address),
            ));
        }

        if let Err(e) = destination.compile() {
            result.add_error(ValidationError::error(
                format!("{field}.pattern"),
                e.to_string(),
            ));
        }

        result
    }
}

impl Validator for DestinationValidator {
    fn validate(&self, config: &TeeConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        if config.destinations.is_empty() {
            result.add_error(ValidationError::error(
                "destinations",
                "At least one destination is required",
            ));
        }

        for (index, destination) in config.destinations.iter().enumerate() {
            result.merge(Self::validate_one(index, destination));
        }

        // Same address twice is allowed but almost always a mistake.
        let mut seen = std::collections::HashSet::new();
        for destination in &config.destinations {
            if !seen.insert(destination.dial_address()) {
                result.add_error(ValidationError::warning(
                    "destinations",
                    format!("Destination {} is listed more than once", destination.address),
                ));
            }
        }

        result
    }
}

fn has_port(address: &str) -> bool {
    address
        .rsplit_once(':')
        .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
}
