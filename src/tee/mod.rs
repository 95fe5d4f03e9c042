//! # Tee Pipeline
//!
//! Receives statsd datagrams, rewrites metric keys per destination and fans
//! the rewritten packets out over one persistent UDP socket per destination.
//!
//! ## Data flow
//!
//! ```text
//! IngressListener -> bounded queue -> FanoutRouter -> parse -> rewrite -> DestinationLink
//! ```
//!
//! The listener and the router run as two tasks. The queue blocks the
//! listener when full, so overload shows up as kernel-level drops rather than
//! unbounded memory growth.
//!
//! ## Failure handling
//!
//! - Inbound read errors are logged and skipped.
//! - Malformed lines are dropped silently.
//! - A failed write closes the destination socket and reconnects once; the
//!   packet itself is not re-sent.
//! - Failing to bind, to dial a destination at startup, or to reconnect is
//!   fatal and surfaces as an error from [`Tee::run`] or [`Tee::start`].

mod error;
mod link;
mod listener;
mod parser;
mod rewrite;
mod router;
mod service;
mod stats;

#[cfg(test)]
mod mock;

pub use error::{TeeError, TeeResult};
pub use link::{
    dial_udp, Connection, Connector, DestinationLink, DialFuture, UdpConnector, WriteFuture,
    DEFAULT_CONNECT_TIMEOUT,
};
pub use listener::IngressListener;
pub use parser::{parse_records, Record, Records};
pub use rewrite::Destination;
pub use router::{encode_packet, FanoutRouter};
pub use service::Tee;
pub use stats::{TeeStats, TeeStatsSnapshot};
