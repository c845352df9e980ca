//! Sampling loop: fold, render, decide when to flush.
//!
//! One logical loop owns the aggregate window; nothing else ever mutates it,
//! so no locking is needed. Flush dispatches run on their own short-lived
//! thread so a slow store never stalls sampling, and exactly one dispatch
//! handle is tracked — a second flush cannot be issued while one is in
//! flight, it is deferred to the next fold.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::aggregate::AggregateWindow;
use crate::clock::Clock;
use crate::display::DisplaySink;
use crate::sensor::Sample;
use crate::store::StoreSink;
use crate::transport::ReadError;

/// Default accumulation period between flushes.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(60);

/// Fixed pause after a failed read before retrying. The only retry policy:
/// no exponential backoff, no retry budget.
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// How often the loop wakes up to re-check the closing flag when the sensor
/// is silent.
const RECV_POLL: Duration = Duration::from_millis(100);

/// Granularity of interruptible pauses.
const PAUSE_SLICE: Duration = Duration::from_millis(100);

/// Lifecycle of the sampling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Sampling,
    /// Transient: snapshotting the window and dispatching the store thread.
    Flushing,
    Stopping,
    Stopped,
}

/// Drives sampling, aggregation, display and periodic flushing.
pub struct SampleScheduler<C: Clock> {
    clock: C,
    window: AggregateWindow,
    flush_interval: Duration,
    error_backoff: Duration,
    store: Arc<dyn StoreSink>,
    display: Box<dyn DisplaySink>,
    closing: Arc<AtomicBool>,
    /// At most one flush dispatch is ever in flight; tracking a single
    /// handle (not a queue) makes overlap structurally impossible.
    in_flight: Option<JoinHandle<()>>,
    state: SchedulerState,
}

impl<C: Clock> SampleScheduler<C> {
    pub fn new(
        clock: C,
        flush_interval: Duration,
        store: Arc<dyn StoreSink>,
        display: Box<dyn DisplaySink>,
        closing: Arc<AtomicBool>,
    ) -> Self {
        let window = AggregateWindow::new(clock.now());
        Self {
            clock,
            window,
            flush_interval,
            error_backoff: ERROR_BACKOFF,
            store,
            display,
            closing,
            in_flight: None,
            state: SchedulerState::Idle,
        }
    }

    /// Overrides the fixed error backoff (tests shrink it).
    pub fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    /// Whether a flush dispatch is currently running.
    pub fn flush_in_flight(&self) -> bool {
        self.in_flight.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn window(&self) -> &AggregateWindow {
        &self.window
    }

    /// Consumes decoded results until the closing flag is observed.
    ///
    /// Cancellation is cooperative: the flag is checked once per iteration,
    /// and the current iteration always completes.
    pub fn run(&mut self, events: Receiver<Result<Sample, ReadError>>) {
        self.state = SchedulerState::Sampling;
        while !self.closing.load(Ordering::SeqCst) {
            match events.recv_timeout(RECV_POLL) {
                Ok(Ok(sample)) => self.handle_sample(sample),
                Ok(Err(err)) => {
                    warn!("could not read sample: {}", err);
                    self.pause(self.error_backoff);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("reader worker is gone, stopping sampling loop");
                    break;
                }
            }
        }
        self.state = SchedulerState::Stopping;
    }

    /// Folds one decoded sample, renders it, and flushes if the window
    /// interval has elapsed.
    ///
    /// Flushing is only ever evaluated here, after a successful fold — a
    /// stalled sensor delays flushing rather than flushing an empty window.
    pub fn handle_sample(&mut self, sample: Sample) {
        self.window.fold(sample);
        let now = self.clock.now();
        self.display.render(now, sample.pm25, sample.pm10);
        debug!(
            "sample #{}: running avg {:.2}, {:.2}",
            self.window.count(),
            self.window.avg_pm25(),
            self.window.avg_pm10()
        );

        let elapsed = (now - self.window.window_start())
            .to_std()
            .unwrap_or(Duration::ZERO);
        if elapsed >= self.flush_interval {
            self.dispatch_flush(sample, elapsed);
        }
    }

    /// Snapshots the window and hands it to the store on its own thread.
    ///
    /// If the previous dispatch has not finished, the flush is deferred to
    /// the next fold: the window keeps accumulating and nothing is dropped
    /// or duplicated.
    fn dispatch_flush(&mut self, last_sample: Sample, elapsed: Duration) {
        if let Some(handle) = &self.in_flight
            && !handle.is_finished()
        {
            debug!("flush due but previous dispatch still in flight, deferring");
            return;
        }
        // Reap the finished dispatch before starting the next one.
        if let Some(handle) = self.in_flight.take()
            && handle.join().is_err()
        {
            warn!("previous flush dispatch panicked");
        }

        self.state = SchedulerState::Flushing;
        let now = self.clock.now();
        let reading = self.window.snapshot(now);
        info!(
            "window closed after {}s, {} samples: pm25={:.2} pm10={:.2}",
            elapsed.as_secs(),
            self.window.count(),
            reading.pm25,
            reading.pm10
        );

        let store = Arc::clone(&self.store);
        self.in_flight = Some(thread::spawn(move || {
            if let Err(e) = store.insert(&reading) {
                // The aggregated window for this interval is lost; the loop
                // keeps sampling.
                warn!("{}", e);
            } else {
                debug!("flush dispatch finished");
            }
        }));

        self.window.reset_with_seed(last_sample, now);
        self.state = SchedulerState::Sampling;
    }

    /// Joins the in-flight flush, if any. A panic in the flush thread is
    /// swallowed: shutdown must not fail because a flush was interrupted.
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            debug!("waiting for in-flight flush dispatch");
            if handle.join().is_err() {
                warn!("in-flight flush panicked during shutdown");
            }
        }
        self.state = SchedulerState::Stopped;
    }

    /// Sleeps in slices so the closing flag stays responsive.
    fn pause(&self, duration: Duration) {
        let mut remaining = duration;
        while remaining > Duration::ZERO && !self.closing.load(Ordering::SeqCst) {
            let slice = remaining.min(PAUSE_SLICE);
            thread::sleep(slice);
            remaining = remaining.saturating_sub(slice);
        }
    }
}
