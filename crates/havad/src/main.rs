//! havad — air quality collector daemon.
//!
//! Samples an SDS011 particulate-matter sensor over a serial port, keeps a
//! running average, stores one aggregated reading per flush interval to
//! PostgreSQL and renders the latest values to a display sink.

use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use hava_core::clock::SystemClock;
use hava_core::collector::{Collector, CollectorConfig};
use hava_core::display::tui::TuiDisplay;
use hava_core::display::{DisplaySink, LogDisplay};
use hava_core::store::StoreSink;
use hava_core::store::postgres::PostgresStore;
use hava_core::transport::ByteSource;
use hava_core::transport::mock::SyntheticByteSource;
use hava_core::transport::serial::SerialByteSource;

/// Air quality collector daemon.
#[derive(Parser)]
#[command(name = "havad", about = "Air quality collector daemon", version)]
struct Args {
    /// Serial port of the SDS011 sensor.
    #[arg(long, default_value = "/dev/ttyUSB0", env = "SDS011_SERIAL_PORT")]
    serial_port: String,

    /// PostgreSQL endpoint for aggregated readings.
    #[arg(long, default_value = "postgres://localhost/air", env = "DB_URI")]
    db_uri: String,

    /// Seconds of accumulation between stored readings.
    #[arg(long, default_value = "60")]
    flush_interval: u64,

    /// Generate synthetic sensor data instead of opening the serial port.
    #[arg(long)]
    mock_sensor: bool,

    /// Render the latest values full-screen in the terminal.
    #[arg(long)]
    tui: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber with the appropriate log level.
///
/// When the TUI owns stdout, logs go to stderr instead.
fn init_logging(verbose: u8, quiet: bool, to_stderr: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("havad={}", level).parse().unwrap())
        .add_directive(format!("hava_core={}", level).parse().unwrap());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    if to_stderr {
        builder.with_writer(std::io::stderr).init();
    } else {
        builder.init();
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet, args.tui);

    info!("havad {} starting", env!("CARGO_PKG_VERSION"));

    let config = CollectorConfig {
        device: args.serial_port.clone(),
        db_uri: args.db_uri.clone(),
        flush_interval: Duration::from_secs(args.flush_interval),
    };
    info!(
        "Config: port={}, store={}, flush_interval={}s",
        config.device,
        config.db_uri,
        args.flush_interval
    );

    let source: Box<dyn ByteSource> = if args.mock_sensor {
        warn!("running with a synthetic sensor, no hardware involved");
        Box::new(SyntheticByteSource::new())
    } else {
        match SerialByteSource::open(&config.device) {
            Ok(source) => Box::new(source),
            Err(e) => {
                error!("unable to set up the service: {}", e);
                return ExitCode::FAILURE;
            }
        }
    };

    let store: Arc<dyn StoreSink> = Arc::new(PostgresStore::new(&config.db_uri));

    let display: Box<dyn DisplaySink> = if args.tui {
        match TuiDisplay::new() {
            Ok(display) => Box::new(display),
            Err(e) => {
                error!("unable to set up the service: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        Box::new(LogDisplay)
    };

    let mut collector = match Collector::setup(&config, SystemClock, source, store, display) {
        Ok(collector) => collector,
        Err(e) => {
            error!("unable to set up the service: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Graceful shutdown on Ctrl-C.
    let closing = collector.closing_flag();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("received shutdown signal");
        closing.store(true, Ordering::SeqCst);
    }) {
        warn!("failed to set Ctrl-C handler: {}", e);
    }

    info!("ready");
    collector.run();

    let pending = collector.window().count();
    if pending > 0 {
        info!("discarding {} samples from the open window", pending);
    }
    info!("bye");
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_defaults_match_sensor_and_store_conventions() {
        let args = Args::parse_from(["havad"]);

        assert_eq!(args.serial_port, "/dev/ttyUSB0");
        assert_eq!(args.db_uri, "postgres://localhost/air");
        assert_eq!(args.flush_interval, 60);
        assert!(!args.mock_sensor);
        assert!(!args.tui);
    }

    #[test]
    fn args_accept_overrides() {
        let args = Args::parse_from([
            "havad",
            "--serial-port",
            "/dev/ttyAMA0",
            "--flush-interval",
            "300",
            "--mock-sensor",
            "-vv",
        ]);

        assert_eq!(args.serial_port, "/dev/ttyAMA0");
        assert_eq!(args.flush_interval, 300);
        assert!(args.mock_sensor);
        assert_eq!(args.verbose, 2);
    }
}
