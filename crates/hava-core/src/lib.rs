//! hava-core — particulate-matter collection library.
//!
//! Provides:
//! - `sensor` — SDS011 frame decoding (resynchronizing byte stream scan)
//! - `aggregate` — O(1)-memory running average over a flush window
//! - `scheduler` — sampling loop, flush timing, non-blocking store dispatch
//! - `collector` — composition root (startup, run loop, shutdown)
//! - `transport` — blocking byte source seam, serial adapter, reader worker
//! - `store` — persistence seam, PostgreSQL adapter
//! - `display` — rendering seam, terminal display (feature `tui`, default)
//! - `clock` — injectable wall clock for deterministic timing tests
//!
//! The `mock` submodules (`transport::mock`, `store::mock`, `display::mock`)
//! are public so the daemon can run without hardware and tests can observe
//! every seam.

pub mod aggregate;
pub mod clock;
pub mod collector;
pub mod display;
pub mod scheduler;
pub mod sensor;
pub mod store;
pub mod transport;

pub use aggregate::AggregateWindow;
pub use clock::{Clock, SystemClock};
pub use collector::{Collector, CollectorConfig, SetupError};
pub use scheduler::{DEFAULT_FLUSH_INTERVAL, SampleScheduler, SchedulerState};
pub use sensor::{FrameDecoder, FrameError, Sample};
pub use store::{StoreError, StoreSink, StoredReading};
pub use transport::{ByteSource, ReadError, TransportError};
