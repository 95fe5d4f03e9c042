//! Pipeline statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Point-in-time copy of the pipeline counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeeStatsSnapshot {
    /// Datagrams read from the inbound socket.
    pub datagrams_received: u64,

    /// Bytes read from the inbound socket.
    pub bytes_received: u64,

    /// Inbound read errors.
    pub recv_errors: u64,

    /// Datagrams dropped because the router had gone away.
    pub datagrams_dropped: u64,

    /// Records extracted from datagrams.
    pub records_parsed: u64,

    /// Non-empty lines discarded by the parser.
    pub lines_malformed: u64,

    /// Packets written to destinations.
    pub packets_sent: u64,

    /// Bytes written to destinations.
    pub bytes_sent: u64,

    /// Outbound write failures.
    pub send_errors: u64,

    /// Successful reconnects after a write failure.
    pub reconnects: u64,

    /// Uptime in seconds.
    pub uptime_seconds: u64,
}

/// Shared atomic counters, updated by the listener, router and links.
#[derive(Debug)]
pub struct TeeStats {
    datagrams_received: AtomicU64,
    bytes_received: AtomicU64,
    recv_errors: AtomicU64,
    datagrams_dropped: AtomicU64,
    records_parsed: AtomicU64,
    lines_malformed: AtomicU64,
    packets_sent: AtomicU64,
    bytes_sent: AtomicU64,
    send_errors: AtomicU64,
    reconnects: AtomicU64,
    created_at: Instant,
}

impl Default for TeeStats {
    fn default() -> Self {
        Self {
            datagrams_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            recv_errors: AtomicU64::new(0),
            datagrams_dropped: AtomicU64::new(0),
            records_parsed: AtomicU64::new(0),
            lines_malformed: AtomicU64::new(0),
            packets_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            send_errors: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            created_at: Instant::now(),
        }
    }
}

impl TeeStats {
    /// Create zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_received(&self, bytes: usize) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_recv_error(&self) {
        self.recv_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.datagrams_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_parsed(&self, records: usize, malformed: usize) {
        self.records_parsed
            .fetch_add(records as u64, Ordering::Relaxed);
        self.lines_malformed
            .fetch_add(malformed as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_sent(&self, bytes: usize) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_send_error(&self) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> TeeStatsSnapshot {
        TeeStatsSnapshot {
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            recv_errors: self.recv_errors.load(Ordering::Relaxed),
            datagrams_dropped: self.datagrams_dropped.load(Ordering::Relaxed),
            records_parsed: self.records_parsed.load(Ordering::Relaxed),
            lines_malformed: self.lines_malformed.load(Ordering::Relaxed),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            uptime_seconds: self.created_at.elapsed().as_secs(),
        }
    }
}
