//! Ingress listener: the inbound UDP socket.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::error::{TeeError, TeeResult};
use super::stats::TeeStats;
use crate::config::TeeSettings;

/// The bound inbound socket.
pub struct IngressListener {
    socket: UdpSocket,
    local_addr: SocketAddr,
    max_datagram_size: usize,
    stats: Arc<TeeStats>,
}

impl IngressListener {
    /// Resolve and bind the listen address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be resolved or bound.
    pub async fn bind(settings: &TeeSettings, stats: Arc<TeeStats>) -> TeeResult<Self> {
        let bind_address = settings.bind_address();
        let address = tokio::net::lookup_host(&*bind_address)
            .await
            .map_err(|e| TeeError::ResolveError {
                address: bind_address.to_string(),
                source: e,
            })?
            .next()
            .ok_or_else(|| TeeError::ResolveError {
                address: bind_address.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no addresses resolved"),
            })?;

        let socket = Self::bind_socket(address, settings.recv_buffer_size)
            .map_err(|e| TeeError::bind(address, e))?;
        let local_addr = socket
            .local_addr()
            .map_err(|e| TeeError::bind(address, e))?;

        info!(
            address = %local_addr,
            max_datagram_size = settings.max_datagram_size,
            "Listening for statsd packets"
        );

        Ok(Self {
            socket,
            local_addr,
            max_datagram_size: settings.max_datagram_size,
            stats,
        })
    }

    fn bind_socket(address: SocketAddr, recv_buffer_size: usize) -> io::Result<UdpSocket> {
        let domain = if address.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };
        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;

        if let Err(e) = socket.set_recv_buffer_size(recv_buffer_size) {
            warn!(
                error = %e,
                requested_size = recv_buffer_size,
                "Failed to set UDP SO_RCVBUF"
            );
        }

        socket.bind(&address.into())?;
        socket.set_nonblocking(true)?;

        let std_socket: std::net::UdpSocket = socket.into();
        UdpSocket::from_std(std_socket)
    }

    /// The bound address.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Read one datagram into a freshly allocated buffer.
    ///
    /// Payloads longer than the maximum datagram size are truncated.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub async fn recv(&self) -> TeeResult<Bytes> {
        let mut buf = BytesMut::zeroed(self.max_datagram_size);

        match self.socket.recv_from(&mut buf).await {
            Ok((n, peer)) => {
                buf.truncate(n);
                self.stats.record_received(n);
                debug!(
                    len = n,
                    peer = %peer,
                    message = %String::from_utf8_lossy(&buf),
                    "Received datagram"
                );
                Ok(buf.freeze())
            },
            Err(e) => {
                self.stats.record_recv_error();
                Err(TeeError::RecvError(e))
            },
        }
    }

    /// Read datagrams and push them onto the queue until the queue closes.
    ///
    /// Read errors are logged and skipped. A full queue blocks the loop.
    ///
    /// # Errors
    ///
    /// Returns a read error only if it is fatal.
    pub async fn run(self, tx: mpsc::Sender<Bytes>) -> TeeResult<()> {
        let listener = &self;
        forward(move || listener.recv(), tx, &self.stats).await
    }
}

async fn forward<F, Fut>(mut read: F, tx: mpsc::Sender<Bytes>, stats: &TeeStats) -> TeeResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = TeeResult<Bytes>>,
{
    loop {
        let datagram = match read().await {
            Ok(datagram) => datagram,
            Err(e) if !e.is_fatal() => {
                error!(error = %e, "Reading UDP packet failed");
                continue;
            },
            Err(e) => return Err(e),
        };

        if tx.send(datagram).await.is_err() {
            stats.record_dropped();
            info!("Datagram queue closed, listener stopping");
            return Ok(());
        }
    }
}

impl std::fmt::Debug for IngressListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngressListener")
            .field("local_addr", &self.local_addr)
            .field("max_datagram_size", &self.max_datagram_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Duration;

    use super::*;

    fn loopback_settings() -> TeeSettings {
        TeeSettings {
            listen_address: "127.0.0.1:0".to_string(),
            ..TeeSettings::default()
        }
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let listener = IngressListener::bind(&loopback_settings(), Arc::new(TeeStats::new()))
            .await
            .unwrap();
        assert_ne!(listener.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_empty_host() {
        let settings = TeeSettings {
            listen_address: ":0".to_string(),
            ..TeeSettings::default()
        };
        let listener = IngressListener::bind(&settings, Arc::new(TeeStats::new()))
            .await
            .unwrap();

        assert!(listener.local_addr().ip().is_unspecified());
        assert!(listener.local_addr().is_ipv4());
    }

    #[tokio::test]
    async fn test_bind_conflict_is_error() {
        let taken = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let settings = TeeSettings {
            listen_address: taken.local_addr().unwrap().to_string(),
            ..TeeSettings::default()
        };

        let result = IngressListener::bind(&settings, Arc::new(TeeStats::new())).await;
        assert!(matches!(result, Err(TeeError::BindError { .. })));
    }

    #[tokio::test]
    async fn test_recv_datagram() {
        let stats = Arc::new(TeeStats::new());
        let listener = IngressListener::bind(&loopback_settings(), Arc::clone(&stats))
            .await
            .unwrap();

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client
            .send_to(b"stats.counter:5|c\n", listener.local_addr())
            .await
            .unwrap();

        let datagram = listener.recv().await.unwrap();
        assert_eq!(&datagram[..], b"stats.counter:5|c\n");
        assert_eq!(stats.snapshot().datagrams_received, 1);
        assert_eq!(stats.snapshot().bytes_received, 18);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_oversized_datagram_is_truncated() {
        let listener = IngressListener::bind(&loopback_settings(), Arc::new(TeeStats::new()))
            .await
            .unwrap();

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let payload = vec![b'a'; 600];
        client
            .send_to(&payload, listener.local_addr())
            .await
            .unwrap();

        let datagram = listener.recv().await.unwrap();
        assert_eq!(datagram.len(), 512);
    }

    #[tokio::test]
    async fn test_run_forwards_to_queue() {
        let listener = IngressListener::bind(&loopback_settings(), Arc::new(TeeStats::new()))
            .await
            .unwrap();
        let addr = listener.local_addr();

        let (tx, mut rx) = mpsc::channel(8);
        let handle = tokio::spawn(listener.run(tx));

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(b"a:1|c", addr).await.unwrap();
        client.send_to(b"b:2|c", addr).await.unwrap();

        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let second = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&first[..], b"a:1|c");
        assert_eq!(&second[..], b"b:2|c");

        handle.abort();
    }

    #[tokio::test]
    async fn test_full_queue_blocks_listener() {
        let stats = Arc::new(TeeStats::new());
        let listener = IngressListener::bind(&loopback_settings(), Arc::clone(&stats))
            .await
            .unwrap();
        let addr = listener.local_addr();

        let (tx, mut rx) = mpsc::channel(1);
        let handle = tokio::spawn(listener.run(tx));

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        for payload in [&b"a:1|c"[..], b"b:2|c", b"c:3|c"] {
            client.send_to(payload, addr).await.unwrap();
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!handle.is_finished());
        assert_eq!(stats.snapshot().datagrams_dropped, 0);

        let mut received = Vec::new();
        for _ in 0..3 {
            let datagram = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
            received.push(datagram);
        }
        assert_eq!(&received[0][..], b"a:1|c");
        assert_eq!(&received[1][..], b"b:2|c");
        assert_eq!(&received[2][..], b"c:3|c");
        assert_eq!(stats.snapshot().datagrams_dropped, 0);

        handle.abort();
    }

    #[tokio::test]
    async fn test_read_errors_are_skipped() {
        let mut reads: VecDeque<TeeResult<Bytes>> = VecDeque::from([
            Err(TeeError::RecvError(io::Error::other("connection refused"))),
            Ok(Bytes::from_static(b"a:1|c")),
            Err(TeeError::RecvError(io::Error::other("interrupted"))),
            Ok(Bytes::from_static(b"b:2|c")),
        ]);
        let read = move || {
            let next = reads.pop_front();
            async move {
                match next {
                    Some(result) => result,
                    None => std::future::pending().await,
                }
            }
        };

        let stats = TeeStats::new();
        let (tx, mut rx) = mpsc::channel(8);
        let still_running =
            tokio::time::timeout(Duration::from_millis(100), forward(read, tx, &stats)).await;

        assert!(still_running.is_err());
        assert_eq!(&rx.recv().await.unwrap()[..], b"a:1|c");
        assert_eq!(&rx.recv().await.unwrap()[..], b"b:2|c");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_fatal_read_error_stops_listener() {
        let mut reads: VecDeque<TeeResult<Bytes>> = VecDeque::from([
            Ok(Bytes::from_static(b"a:1|c")),
            Err(TeeError::TaskFailed {
                task: "listener",
                message: "socket gone".to_string(),
            }),
        ]);
        let read = move || {
            let next = reads.pop_front();
            async move { next.unwrap_or_else(|| Ok(Bytes::new())) }
        };

        let stats = TeeStats::new();
        let (tx, mut rx) = mpsc::channel(8);
        let result = forward(read, tx, &stats).await;

        assert!(matches!(result, Err(TeeError::TaskFailed { .. })));
        assert_eq!(&rx.recv().await.unwrap()[..], b"a:1|c");
    }

    #[tokio::test]
    async fn test_closed_queue_counts_drop() {
        let read = || async { Ok::<_, TeeError>(Bytes::from_static(b"a:1|c")) };

        let stats = TeeStats::new();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        forward(read, tx, &stats).await.unwrap();
        assert_eq!(stats.snapshot().datagrams_dropped, 1);
    }
}
