//! Configuration type definitions.

use serde::Deserialize;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::error::{ConfigError, ConfigResult};
use crate::tee::Destination;

/// Host used for a listen address written as a bare `:port`.
pub const DEFAULT_LISTEN_HOST: &str = "0.0.0.0";

/// Host used for a destination address written as a bare `:port`.
pub const DEFAULT_DESTINATION_HOST: &str = "127.0.0.1";

/// Fill in `host` when `address` has an empty host part.
fn with_default_host<'a>(address: &'a str, host: &str) -> Cow<'a, str> {
    if address.starts_with(':') {
        Cow::Owned(format!("{host}{address}"))
    } else {
        Cow::Borrowed(address)
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TeeConfig {
    /// Listener, queue and link settings.
    pub tee: TeeSettings,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Destinations, in fan-out order.
    pub destinations: Vec<DestinationConfig>,
}

impl TeeConfig {
    /// Compile every destination, preserving order.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no destinations or a pattern does not
    /// compile.
    pub fn compile_destinations(&self) -> ConfigResult<Vec<Destination>> {
        if self.destinations.is_empty() {
            return Err(ConfigError::NoDestinations);
        }

        self.destinations
            .iter()
            .map(DestinationConfig::compile)
            .collect()
    }
}

/// Pipeline settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TeeSettings {
    /// UDP listening address (`host:port`).
    pub listen_address: String,

    /// Bytes read per datagram; longer datagrams are truncated.
    pub max_datagram_size: usize,

    /// Kernel receive buffer size for the inbound socket.
    pub recv_buffer_size: usize,

    /// Capacity of the queue between listener and router.
    pub queue_capacity: usize,

    /// Timeout for dialing a destination, in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for TeeSettings {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:8125".to_string(),
            max_datagram_size: 512,
            recv_buffer_size: 1048576, // 1MB
            queue_capacity: 1000,
            connect_timeout_ms: 1000,
        }
    }
}

impl TeeSettings {
    /// The address to bind, with `:port` expanded to [`DEFAULT_LISTEN_HOST`].
    #[must_use]
    pub fn bind_address(&self) -> Cow<'_, str> {
        with_default_host(&self.listen_address, DEFAULT_LISTEN_HOST)
    }

    /// Get the connect timeout as a Duration.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// One downstream destination and its key rewrite rule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DestinationConfig {
    /// Destination address (`host:port`).
    pub address: String,

    /// Regular expression matched against metric keys.
    pub pattern: String,

    /// Replacement template; `$1` refers to the first capture group.
    #[serde(default)]
    pub replacement: String,
}

impl DestinationConfig {
    /// Create a destination config.
    #[must_use]
    pub fn new(address: &str, pattern: &str, replacement: &str) -> Self {
        Self {
            address: address.to_string(),
            pattern: pattern.to_string(),
            replacement: replacement.to_string(),
        }
    }

    /// The address to dial, with `:port` expanded to
    /// [`DEFAULT_DESTINATION_HOST`].
    #[must_use]
    pub fn dial_address(&self) -> Cow<'_, str> {
        with_default_host(&self.address, DEFAULT_DESTINATION_HOST)
    }

    /// Compile the pattern into a [`Destination`].
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is not a valid regular expression.
    pub fn compile(&self) -> ConfigResult<Destination> {
        Destination::new(
            self.dial_address(),
            &self.pattern,
            self.replacement.as_bytes(),
        )
        .map_err(|e| ConfigError::InvalidPattern {
            pattern: self.pattern.clone(),
            source: e,
        })
    }
}

impl FromStr for DestinationConfig {
    type Err = ConfigError;

    /// Parse `host:port:regex:replacement`.
    ///
    /// The value is split into at most four fields, so the replacement may
    /// contain colons but the host and regex may not. An empty host means
    /// [`DEFAULT_DESTINATION_HOST`].
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = |message: &str| ConfigError::InvalidDestination {
            value: value.to_string(),
            message: message.to_string(),
        };

        let parts: Vec<&str> = value.splitn(4, ':').collect();
        let [host, port, pattern, replacement] = parts[..] else {
            return Err(invalid("expected host:port:regex:replacement"));
        };

        let host = if host.is_empty() {
            DEFAULT_DESTINATION_HOST
        } else {
            host
        };
        if port.parse::<u16>().is_err() {
            return Err(invalid("port must be a number between 0 and 65535"));
        }

        Ok(Self {
            address: format!("{host}:{port}"),
            pattern: pattern.to_string(),
            replacement: replacement.to_string(),
        })
    }
}

impl fmt::Display for DestinationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.address, self.pattern, self.replacement)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: LogLevel,

    /// Log format (json, pretty, compact).
    pub format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level (most verbose).
    Trace,
    /// Debug level.
    Debug,
    /// Info level (default).
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level (least verbose).
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                message: format!("unknown log level '{other}'"),
            }),
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format (machine-readable).
    Json,
    /// Pretty format with colors (default).
    #[default]
    Pretty,
    /// Compact single-line format.
    Compact,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(ConfigError::InvalidValue {
                field: "logging.format".to_string(),
                message: format!("unknown log format '{other}'"),
            }),
        }
    }
}
