//! # Configuration System
//!
//! TOML-based configuration for statsd-tee, layered under the command line.
//!
//! ## Example Configuration
//!
//! ```toml
//! [tee]
//! listen_address = "0.0.0.0:8125"
//! queue_capacity = 1000
//!
//! [logging]
//! level = "info"
//! format = "json"
//!
//! [[destinations]]
//! address = "127.0.0.1:9001"
//! pattern = '^stats\.'
//! replacement = "prod.stats."
//! ```
//!
//! On the command line a destination is written `host:port:regex:replacement`.
//! An address with an empty host (`:8125`) binds every interface when
//! listening and dials `127.0.0.1` for destinations.

mod error;
mod loader;
mod types;
mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use types::{
    DestinationConfig, LogFormat, LogLevel, LoggingConfig, TeeConfig, TeeSettings,
    DEFAULT_DESTINATION_HOST, DEFAULT_LISTEN_HOST,
};
pub use validation::{
    DestinationValidator, SettingsValidator, ValidationError, ValidationResult,
    ValidationSeverity, Validator,
};
