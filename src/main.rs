//! statsd-tee binary entry point.
//!
//! ```bash
//! statsd-tee --address 0.0.0.0:8125 \
//!     --destination-address '127.0.0.1:9001:^stats\.:prod.stats.' \
//!     --destination-address '127.0.0.1:9002:^stats\.:dev.stats.'
//!
//! statsd-tee --config /etc/statsd-tee.toml
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use statsd_tee::config::{
    ConfigError, ConfigLoader, DestinationConfig, LogFormat, LogLevel, LoggingConfig, TeeConfig,
};
use statsd_tee::logging;
use statsd_tee::tee::{Tee, TeeError};

/// UDP tee for statsd packets with per-destination key rewriting
#[derive(Parser, Debug)]
#[command(name = "statsd-tee")]
#[command(version, about, long_about = None)]
struct Cli {
    /// UDP listening address [default: 0.0.0.0:8125]
    #[arg(long, value_name = "HOST:PORT")]
    address: Option<String>,

    /// Destination address (may be given multiple times)
    #[arg(long = "destination-address", value_name = "HOST:PORT:REGEX:REPLACEMENT")]
    destination_addresses: Vec<DestinationConfig>,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<LogLevel>,

    /// Log format (pretty, compact, json)
    #[arg(long)]
    log_format: Option<LogFormat>,
}

impl Cli {
    /// Merge the configuration file (if any) with command-line overrides.
    /// Destinations from the command line are appended after the file's.
    fn build_config(&self) -> Result<TeeConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ConfigLoader::new().read_file(path)?,
            None => TeeConfig::default(),
        };

        if let Some(address) = &self.address {
            config.tee.listen_address = address.clone();
        }
        config
            .destinations
            .extend(self.destination_addresses.iter().cloned());

        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }

        Ok(config)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.build_config() {
        Ok(config) => config,
        Err(e) => {
            report_config_error(&e);
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = logging::init(&config.logging) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    if let Err(e) = ConfigLoader::with_default_validators().validate(&config) {
        error!(error = %e, "Invalid configuration");
        return ExitCode::FAILURE;
    }

    // One worker for the listener, one for the router.
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("statsd-tee")
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to build runtime");
            return ExitCode::FAILURE;
        },
    };

    let code = match runtime.block_on(serve(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Fatal error, exiting");
            ExitCode::FAILURE
        },
    };

    // In-flight datagrams are not drained.
    runtime.shutdown_background();
    code
}

/// Log a configuration error with default logging, or print it to stderr if
/// no subscriber can be installed.
fn report_config_error(e: &ConfigError) {
    match logging::init(&LoggingConfig::default()) {
        Ok(()) => error!(error = %e, "Invalid configuration"),
        Err(init_error) => {
            eprintln!("failed to initialize logging: {init_error}");
            eprintln!("invalid configuration: {e}");
        },
    }
}

async fn serve(config: TeeConfig) -> Result<(), TeeError> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen_address = %config.tee.listen_address,
        destinations = config.destinations.len(),
        "Starting statsd-tee"
    );
    for destination in &config.destinations {
        info!(destination = %destination, "Configured destination");
    }

    let tee = Tee::start(&config).await?;
    let stats = tee.stats();

    let result = tokio::select! {
        result = tee.run() => result,
        () = shutdown_signal() => {
            info!("Received termination signal, exiting");
            Ok(())
        }
    };

    let snapshot = stats.snapshot();
    info!(
        datagrams_received = snapshot.datagrams_received,
        records_parsed = snapshot.records_parsed,
        packets_sent = snapshot.packets_sent,
        send_errors = snapshot.send_errors,
        reconnects = snapshot.reconnects,
        uptime_seconds = snapshot.uptime_seconds,
        "Final statistics"
    );

    result
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
