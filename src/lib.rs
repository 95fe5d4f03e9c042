//! # statsd-tee
//!
//! A UDP tee for statsd traffic. It listens for statsd packets on one socket
//! and forwards every metric to each configured destination, rewriting the
//! metric key with a per-destination regular expression on the way.
//!
//! ## Features
//!
//! - Multi-record datagrams (`key:body` lines separated by `\n`)
//! - Per-destination key rewriting with capture-group templates
//! - One persistent UDP socket per destination, reconnected on write failure
//! - Bounded queue between the listener and the router
//!
//! ## Example
//!
//! ```no_run
//! use statsd_tee::config::{ConfigLoader, DestinationConfig, TeeConfig};
//! use statsd_tee::tee::Tee;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = TeeConfig::default();
//! config
//!     .destinations
//!     .push(r"127.0.0.1:9001:^stats\.:prod.stats.".parse::<DestinationConfig>()?);
//! ConfigLoader::with_default_validators().validate(&config)?;
//!
//! let tee = Tee::start(&config).await?;
//! tee.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod logging;
pub mod tee;
