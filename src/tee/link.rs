//! Destination links: one reconnectable outbound UDP socket per destination.

use std::future::Future;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tracing::{debug, error, info};

use super::error::{TeeError, TeeResult};
use super::rewrite::Destination;
use super::stats::TeeStats;

/// Default timeout for dialing a destination.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Future returned by [`Connector::dial`].
pub type DialFuture<'a, C> = Pin<Box<dyn Future<Output = TeeResult<C>> + Send + 'a>>;

/// Future returned by [`Connection::write`].
pub type WriteFuture<'a> = Pin<Box<dyn Future<Output = io::Result<usize>> + Send + 'a>>;

/// An outbound socket already aimed at one remote endpoint.
pub trait Connection: Send {
    /// Write one datagram.
    fn write<'a>(&'a mut self, buf: &'a [u8]) -> WriteFuture<'a>;
}

/// Opens connections to destination addresses.
pub trait Connector: Send + Sync {
    /// The connection type produced.
    type Conn: Connection + 'static;

    /// Dial `address` (`host:port`).
    fn dial<'a>(&'a self, address: &'a str) -> DialFuture<'a, Self::Conn>;
}

impl Connection for UdpSocket {
    fn write<'a>(&'a mut self, buf: &'a [u8]) -> WriteFuture<'a> {
        Box::pin(self.send(buf))
    }
}

/// Connector producing connected tokio UDP sockets.
#[derive(Debug, Clone, Copy)]
pub struct UdpConnector {
    timeout: Duration,
}

impl UdpConnector {
    /// Create a connector with the given connect timeout.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// The connect timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for UdpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl Connector for UdpConnector {
    type Conn = UdpSocket;

    fn dial<'a>(&'a self, address: &'a str) -> DialFuture<'a, UdpSocket> {
        Box::pin(dial_udp(address, self.timeout))
    }
}

/// Resolve `address`, bind an ephemeral socket of the same family and
/// connect it, all within `timeout`.
///
/// # Errors
///
/// Returns an error if resolution, binding or connecting fails, or if the
/// whole operation takes longer than `timeout`.
pub async fn dial_udp(address: &str, timeout: Duration) -> TeeResult<UdpSocket> {
    let attempt = async {
        let remote = tokio::net::lookup_host(address)
            .await
            .map_err(|e| TeeError::ResolveError {
                address: address.to_string(),
                source: e,
            })?
            .next()
            .ok_or_else(|| TeeError::ResolveError {
                address: address.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no addresses resolved"),
            })?;

        let local: SocketAddr = if remote.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| TeeError::DialError {
                address: address.to_string(),
                source: e,
            })?;
        socket
            .connect(remote)
            .await
            .map_err(|e| TeeError::DialError {
                address: address.to_string(),
                source: e,
            })?;

        Ok::<_, TeeError>(socket)
    };

    match tokio::time::timeout(timeout, attempt).await {
        Ok(result) => result,
        Err(_) => Err(TeeError::DialTimeout {
            address: address.to_string(),
            timeout,
        }),
    }
}

/// A live, reconnectable link to one destination.
pub struct DestinationLink<C: Connector = UdpConnector> {
    destination: Destination,
    connector: Arc<C>,
    conn: Option<C::Conn>,
    stats: Arc<TeeStats>,
}

impl<C: Connector> DestinationLink<C> {
    /// Dial the destination and return a connected link.
    ///
    /// # Errors
    ///
    /// Returns an error if the first connection cannot be established.
    pub async fn connect(
        destination: Destination,
        connector: Arc<C>,
        stats: Arc<TeeStats>,
    ) -> TeeResult<Self> {
        let conn = connector.dial(destination.address()).await?;
        info!(destination = destination.address(), "Destination connected");

        Ok(Self {
            destination,
            connector,
            conn: Some(conn),
            stats,
        })
    }

    /// The destination this link is bound to.
    #[must_use]
    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Whether the link currently holds an open socket.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Send one packet.
    ///
    /// A failed write closes the socket and triggers exactly one reconnect.
    /// The failed packet is not re-sent.
    ///
    /// # Errors
    ///
    /// Returns [`TeeError::ReconnectFailed`] if the reconnect fails. Callers
    /// must treat this as fatal.
    pub async fn send(&mut self, packet: &[u8]) -> TeeResult<()> {
        let result = match self.conn.as_mut() {
            Some(conn) => conn.write(packet).await,
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "link closed")),
        };

        match result {
            Ok(n) => {
                self.stats.record_sent(n);
                debug!(
                    destination = self.destination.address(),
                    bytes = n,
                    "Sent packet"
                );
                Ok(())
            },
            Err(e) => {
                self.stats.record_send_error();
                let err = TeeError::SendError {
                    address: self.destination.address().to_string(),
                    source: e,
                };
                error!(error = %err, "Writing to UDP socket failed, reconnecting");

                self.conn = None;
                self.reconnect().await
            },
        }
    }

    async fn reconnect(&mut self) -> TeeResult<()> {
        match self.connector.dial(self.destination.address()).await {
            Ok(conn) => {
                self.conn = Some(conn);
                self.stats.record_reconnect();
                info!(destination = self.destination.address(), "Destination reconnected");
                Ok(())
            },
            Err(e) => Err(TeeError::ReconnectFailed {
                address: self.destination.address().to_string(),
                source: Box::new(e),
            }),
        }
    }
}

impl<C: Connector> std::fmt::Debug for DestinationLink<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestinationLink")
            .field("destination", &self.destination)
            .field("connected", &self.conn.is_some())
            .finish()
    }
}
