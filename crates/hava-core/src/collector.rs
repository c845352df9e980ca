//! Composition root: wires transport, scheduler, store and display together
//! and owns the lifecycle.
//!
//! ```text
//! byte source ──> reader worker ──> FrameDecoder ──┐
//!                                                  │ single-slot channel
//!                                                  ▼
//!                                      SampleScheduler (this thread)
//!                                        │            │
//!                                        │ each       │ every flush interval
//!                                        ▼ sample     ▼
//!                                   display sink   store sink (own thread)
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::info;

use crate::clock::Clock;
use crate::display::{DisplayError, DisplaySink};
use crate::scheduler::{DEFAULT_FLUSH_INTERVAL, SampleScheduler};
use crate::store::{StoreError, StoreSink};
use crate::transport::{ByteSource, TransportError, spawn_reader};

/// Configuration surface consumed by the core.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Serial device identifier, e.g. `/dev/ttyUSB0`.
    pub device: String,
    /// Store endpoint identifier, e.g. `postgres://localhost/air`.
    pub db_uri: String,
    /// Accumulation period between flushes.
    pub flush_interval: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            device: "/dev/ttyUSB0".to_string(),
            db_uri: "postgres://localhost/air".to_string(),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

/// Fatal startup failure. Anything that goes wrong after startup is logged
/// and retried instead.
#[derive(Debug)]
pub enum SetupError {
    /// Byte source could not be opened.
    Transport(TransportError),
    /// Store probe failed.
    Store(StoreError),
    /// Display initialization failed.
    Display(DisplayError),
}

impl std::fmt::Display for SetupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetupError::Transport(e) => write!(f, "setup: {e}"),
            SetupError::Store(e) => write!(f, "setup: {e}"),
            SetupError::Display(e) => write!(f, "setup: {e}"),
        }
    }
}

impl std::error::Error for SetupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SetupError::Transport(e) => Some(e),
            SetupError::Store(e) => Some(e),
            SetupError::Display(e) => Some(e),
        }
    }
}

impl From<TransportError> for SetupError {
    fn from(e: TransportError) -> Self {
        SetupError::Transport(e)
    }
}

impl From<StoreError> for SetupError {
    fn from(e: StoreError) -> Self {
        SetupError::Store(e)
    }
}

impl From<DisplayError> for SetupError {
    fn from(e: DisplayError) -> Self {
        SetupError::Display(e)
    }
}

/// Owns the sampling loop and its collaborators.
pub struct Collector<C: Clock> {
    closing: Arc<AtomicBool>,
    source: Option<Box<dyn ByteSource>>,
    scheduler: SampleScheduler<C>,
}

impl<C: Clock> Collector<C> {
    /// Verifies all collaborators and assembles the collector.
    ///
    /// The store is probed with a real round-trip and the display is
    /// initialized; any failure aborts startup before anything is running.
    pub fn setup(
        config: &CollectorConfig,
        clock: C,
        source: Box<dyn ByteSource>,
        store: Arc<dyn StoreSink>,
        mut display: Box<dyn DisplaySink>,
    ) -> Result<Self, SetupError> {
        info!("probing store endpoint {}", config.db_uri);
        let existing = store.probe()?;
        info!("store reachable, {} readings already present", existing);

        display.init()?;

        let closing = Arc::new(AtomicBool::new(false));
        let scheduler = SampleScheduler::new(
            clock,
            config.flush_interval,
            store,
            display,
            closing.clone(),
        );
        Ok(Self {
            closing,
            source: Some(source),
            scheduler,
        })
    }

    /// Shared closing flag; a signal handler stores `true` to request a
    /// cooperative stop.
    pub fn closing_flag(&self) -> Arc<AtomicBool> {
        self.closing.clone()
    }

    /// Runs the sampling loop until the closing flag is set or the reader
    /// worker dies, then drains everything in flight.
    pub fn run(&mut self) {
        let Some(source) = self.source.take() else {
            // run() was already called once; nothing left to drive.
            return;
        };
        info!(
            "starting sampling loop on {} (flush every {}s)",
            source.device(),
            self.scheduler.flush_interval().as_secs()
        );

        let (reader, events) = spawn_reader(source, self.closing.clone());

        // The scheduler consumes the receiver; dropping it on return
        // unblocks a reader stuck on a full channel slot.
        self.scheduler.run(events);

        self.closing.store(true, Ordering::SeqCst);
        reader.join();
        self.scheduler.shutdown();
        info!("sampling loop stopped");
    }

    /// Window statistics for tests and shutdown logging.
    pub fn window(&self) -> &crate::aggregate::AggregateWindow {
        self.scheduler.window()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::display::mock::RecordingDisplay;
    use crate::store::mock::MemoryStore;
    use crate::transport::mock::ScriptedByteSource;
    use std::thread;

    fn config() -> CollectorConfig {
        CollectorConfig {
            device: "mock:scripted".into(),
            db_uri: "mock:memory".into(),
            flush_interval: Duration::from_secs(60),
        }
    }

    #[test]
    fn setup_aborts_when_store_is_unreachable() {
        let result = Collector::setup(
            &config(),
            SystemClock,
            Box::new(ScriptedByteSource::new()),
            Arc::new(MemoryStore::failing_probe("connection refused")),
            Box::new(RecordingDisplay::new()),
        );

        assert!(matches!(result, Err(SetupError::Store(_))));
    }

    #[test]
    fn setup_aborts_when_display_init_fails() {
        let result = Collector::setup(
            &config(),
            SystemClock,
            Box::new(ScriptedByteSource::new()),
            Arc::new(MemoryStore::new()),
            Box::new(RecordingDisplay::failing_init()),
        );

        assert!(matches!(result, Err(SetupError::Display(_))));
    }

    #[test]
    fn end_to_end_samples_flow_to_display() {
        let source = ScriptedByteSource::new()
            .with_frame(100, 200)
            .with_frame(150, 300);
        let store = Arc::new(MemoryStore::new());
        let display = RecordingDisplay::new();

        let mut collector = Collector::setup(
            &config(),
            SystemClock,
            Box::new(source),
            store.clone() as Arc<dyn StoreSink>,
            Box::new(display.clone()),
        )
        .unwrap();
        let closing = collector.closing_flag();

        let handle = thread::spawn(move || collector.run());

        for _ in 0..2_000 {
            if display.render_count() >= 2 {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        closing.store(true, Ordering::SeqCst);
        handle.join().unwrap();

        let rendered = display.rendered();
        assert_eq!(rendered.len(), 2);
        assert_eq!((rendered[0].1, rendered[0].2), (10.0, 20.0));
        assert_eq!((rendered[1].1, rendered[1].2), (15.0, 30.0));
        // Interval never elapsed, so nothing was flushed.
        assert_eq!(store.insert_count(), 0);
    }

    #[test]
    fn end_to_end_zero_interval_flushes_first_sample() {
        let source = ScriptedByteSource::new().with_frame(100, 200);
        let store = Arc::new(MemoryStore::new());
        let display = RecordingDisplay::new();
        let config = CollectorConfig {
            flush_interval: Duration::ZERO,
            ..config()
        };

        let mut collector = Collector::setup(
            &config,
            SystemClock,
            Box::new(source),
            store.clone() as Arc<dyn StoreSink>,
            Box::new(display.clone()),
        )
        .unwrap();
        let closing = collector.closing_flag();

        let handle = thread::spawn(move || collector.run());

        for _ in 0..2_000 {
            if store.insert_count() >= 1 {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        closing.store(true, Ordering::SeqCst);
        handle.join().unwrap();

        let readings = store.readings();
        assert!(!readings.is_empty());
        assert_eq!((readings[0].pm25, readings[0].pm10), (10.0, 20.0));
    }
}
