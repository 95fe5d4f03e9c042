//! Tee error types.

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur in the tee pipeline.
#[derive(Debug, Error)]
pub enum TeeError {
    /// Failed to bind the inbound socket.
    #[error("failed to bind to {address}: {source}")]
    BindError {
        /// The address that failed to bind.
        address: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to receive a datagram.
    #[error("failed to receive datagram: {0}")]
    RecvError(#[source] std::io::Error),

    /// Address resolution produced no usable endpoint.
    #[error("failed to resolve {address}: {source}")]
    ResolveError {
        /// The address being resolved.
        address: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to dial a destination.
    #[error("UDP connection to {address} failed: {source}")]
    DialError {
        /// The destination address.
        address: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Dialing a destination did not finish in time.
    #[error("UDP connection to {address} timed out after {timeout:?}")]
    DialTimeout {
        /// The destination address.
        address: String,
        /// The connect timeout that elapsed.
        timeout: Duration,
    },

    /// Failed to write a packet.
    #[error("failed to send packet to {address}: {source}")]
    SendError {
        /// The destination address.
        address: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A destination could not be re-established after a write failure.
    #[error("reconnect to {address} failed: {source}")]
    ReconnectFailed {
        /// The destination address.
        address: String,
        /// The dial error.
        #[source]
        source: Box<TeeError>,
    },

    /// A pipeline task panicked or was cancelled.
    #[error("{task} task failed: {message}")]
    TaskFailed {
        /// Which task failed.
        task: &'static str,
        /// Description of the failure.
        message: String,
    },

    /// Invalid configuration handed to the tee.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl TeeError {
    /// Build a bind error for a resolved address.
    pub(crate) fn bind(address: SocketAddr, source: std::io::Error) -> Self {
        Self::BindError {
            address: address.to_string(),
            source,
        }
    }

    /// Returns `true` if the error must terminate the process.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::RecvError(_) | Self::SendError { .. })
    }
}

/// Result type alias for tee operations.
pub type TeeResult<T> = Result<T, TeeError>;
