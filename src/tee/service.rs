//! The tee service: listener and router joined by a bounded queue.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::{error, info};

use super::error::{TeeError, TeeResult};
use super::link::{Connector, UdpConnector};
use super::listener::IngressListener;
use super::router::FanoutRouter;
use super::stats::TeeStats;
use crate::config::TeeConfig;

/// A fully connected tee, ready to run.
pub struct Tee<C: Connector = UdpConnector> {
    listener: IngressListener,
    router: FanoutRouter<C>,
    queue_capacity: usize,
    stats: Arc<TeeStats>,
}

impl Tee<UdpConnector> {
    /// Dial every destination, then bind the listen address.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration has no usable destinations, a
    /// destination cannot be dialed, or the listen address cannot be bound.
    pub async fn start(config: &TeeConfig) -> TeeResult<Self> {
        let connector = Arc::new(UdpConnector::new(config.tee.connect_timeout()));
        Self::with_connector(config, connector).await
    }
}

impl<C: Connector + 'static> Tee<C> {
    /// Like [`Tee::start`], dialing destinations through `connector`.
    ///
    /// # Errors
    ///
    /// See [`Tee::start`].
    pub async fn with_connector(config: &TeeConfig, connector: Arc<C>) -> TeeResult<Self> {
        let destinations = config.compile_destinations()?;
        let stats = Arc::new(TeeStats::new());

        let router = FanoutRouter::connect(destinations, connector, Arc::clone(&stats)).await?;
        let listener = IngressListener::bind(&config.tee, Arc::clone(&stats)).await?;

        Ok(Self {
            listener,
            router,
            queue_capacity: config.tee.queue_capacity.max(1),
            stats,
        })
    }

    /// The address the listener is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Shared pipeline counters.
    #[must_use]
    pub fn stats(&self) -> Arc<TeeStats> {
        Arc::clone(&self.stats)
    }

    /// Run the listener and router tasks until one of them stops.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error from either task.
    pub async fn run(self) -> TeeResult<()> {
        let (tx, rx) = mpsc::channel(self.queue_capacity);

        let mut listener = tokio::spawn(self.listener.run(tx));
        let mut router = tokio::spawn(self.router.run(rx));

        info!(queue_capacity = self.queue_capacity, "statsd-tee running");

        let result = tokio::select! {
            result = &mut router => {
                listener.abort();
                flatten("router", result)
            }
            result = &mut listener => {
                router.abort();
                flatten("listener", result)
            }
        };

        if let Err(ref e) = result {
            error!(error = %e, "Pipeline stopped");
        }
        result
    }
}

fn flatten(task: &'static str, result: Result<TeeResult<()>, JoinError>) -> TeeResult<()> {
    match result {
        Ok(inner) => inner,
        Err(e) => Err(TeeError::TaskFailed {
            task,
            message: e.to_string(),
        }),
    }
}

impl<C: Connector> std::fmt::Debug for Tee<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tee")
            .field("listener", &self.listener)
            .field("router", &self.router)
            .field("queue_capacity", &self.queue_capacity)
            .finish()
    }
}
