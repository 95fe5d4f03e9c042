//! Fan-out router: parse, rewrite per destination, send.

use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::error::TeeResult;
use super::link::{Connector, DestinationLink, UdpConnector};
use super::parser::parse_records;
use super::rewrite::Destination;
use super::stats::TeeStats;

/// Write `key:body` into `buf`, replacing its previous contents.
pub fn encode_packet(buf: &mut BytesMut, key: &[u8], body: &[u8]) {
    buf.clear();
    buf.reserve(key.len() + 1 + body.len());
    buf.put_slice(key);
    buf.put_u8(b':');
    buf.put_slice(body);
}

/// Routes every record of every datagram to all destinations, in
/// configuration order.
pub struct FanoutRouter<C: Connector = UdpConnector> {
    links: Vec<DestinationLink<C>>,
    stats: Arc<TeeStats>,
    packet: BytesMut,
}

impl<C: Connector> FanoutRouter<C> {
    /// Dial every destination in order.
    ///
    /// # Errors
    ///
    /// Returns the first dial error; no router is built unless every
    /// destination is reachable.
    pub async fn connect(
        destinations: Vec<Destination>,
        connector: Arc<C>,
        stats: Arc<TeeStats>,
    ) -> TeeResult<Self> {
        let mut links = Vec::with_capacity(destinations.len());
        for destination in destinations {
            let link =
                DestinationLink::connect(destination, Arc::clone(&connector), Arc::clone(&stats))
                    .await?;
            links.push(link);
        }

        Ok(Self::from_links(links, stats))
    }

    /// Build a router over already connected links.
    #[must_use]
    pub fn from_links(links: Vec<DestinationLink<C>>, stats: Arc<TeeStats>) -> Self {
        Self {
            links,
            stats,
            packet: BytesMut::with_capacity(512),
        }
    }

    /// The destination links, in fan-out order.
    #[must_use]
    pub fn links(&self) -> &[DestinationLink<C>] {
        &self.links
    }

    /// Route one raw datagram. Returns the number of records found.
    ///
    /// # Errors
    ///
    /// Returns an error only when a link fails fatally.
    pub async fn route(&mut self, datagram: &[u8]) -> TeeResult<usize> {
        let mut parsed = 0;
        let mut records = parse_records(datagram);

        for record in records.by_ref() {
            parsed += 1;

            for link in &mut self.links {
                encode_packet(
                    &mut self.packet,
                    &link.destination().rewrite_key(record.key),
                    record.body,
                );
                link.send(&self.packet).await?;
            }
        }

        self.stats.record_parsed(parsed, records.malformed());
        Ok(parsed)
    }

    /// Drain the datagram queue until it closes.
    ///
    /// # Errors
    ///
    /// Returns the first fatal link error.
    pub async fn run(mut self, mut rx: mpsc::Receiver<Bytes>) -> TeeResult<()> {
        info!(destinations = self.links.len(), "Router started");

        while let Some(datagram) = rx.recv().await {
            let records = self.route(&datagram).await?;
            debug!(len = datagram.len(), records, "Routed datagram");
        }

        info!("Datagram queue closed, router stopping");
        Ok(())
    }
}

impl<C: Connector> std::fmt::Debug for FanoutRouter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutRouter")
            .field("links", &self.links)
            .finish()
    }
}
