//! Display seam: every decoded sample is rendered somewhere.
//!
//! The loop pushes the instantaneous values (not the running average) to the
//! sink after each fold. Rendering is best-effort — the core never acts on a
//! render outcome, so the trait returns nothing and sinks log their own
//! failures.

pub mod mock;
#[cfg(feature = "tui")]
pub mod tui;

use chrono::{DateTime, Utc};
use tracing::debug;

/// Error type for display initialization.
#[derive(Debug)]
pub struct DisplayError(pub String);

impl std::fmt::Display for DisplayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "display init failed: {}", self.0)
    }
}

impl std::error::Error for DisplayError {}

/// Rendering surface for the latest reading.
pub trait DisplaySink: Send {
    /// One-time setup at startup; failure aborts startup.
    fn init(&mut self) -> Result<(), DisplayError> {
        Ok(())
    }

    /// Renders one sample. No return contract; sinks handle their own errors.
    fn render(&mut self, measured_at: DateTime<Utc>, pm25: f64, pm10: f64);
}

/// Headless sink that traces each sample at debug level.
///
/// The default when no terminal display is wanted (e.g. under systemd).
#[derive(Debug, Default)]
pub struct LogDisplay;

impl DisplaySink for LogDisplay {
    fn render(&mut self, measured_at: DateTime<Utc>, pm25: f64, pm10: f64) {
        debug!(
            "{} PM2.5 {:.1} µg/m³, PM10 {:.1} µg/m³",
            measured_at.format("%d-%m-%Y %H:%M:%S"),
            pm25,
            pm10
        );
    }
}
