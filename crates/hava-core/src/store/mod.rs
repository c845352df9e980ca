//! Persistence seam for aggregated readings.
//!
//! The sampling loop never talks to a database directly; it hands a
//! [`StoredReading`] to a [`StoreSink`] from a short-lived flush thread. The
//! production sink is PostgreSQL ([`postgres::PostgresStore`]), tests use the
//! in-memory [`mock::MemoryStore`].

pub mod mock;
pub mod postgres;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One aggregated reading as handed to the store sink at flush time.
///
/// Values are already rounded to 2 decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoredReading {
    pub measured_at: DateTime<Utc>,
    pub pm25: f64,
    pub pm10: f64,
}

/// Error type for store operations.
#[derive(Debug, Clone)]
pub enum StoreError {
    /// Endpoint could not be reached or the probe query failed.
    Unreachable(String),
    /// Insert failed; the window for that interval is lost.
    Write(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unreachable(msg) => write!(f, "store unreachable: {msg}"),
            StoreError::Write(msg) => write!(f, "store write failed: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Durable destination for flushed readings.
///
/// `Send + Sync` because flush dispatches run on their own thread while the
/// sampling loop keeps going.
pub trait StoreSink: Send + Sync {
    /// Round-trip reachability check, run once at startup.
    ///
    /// Returns the number of readings already stored.
    fn probe(&self) -> Result<u64, StoreError>;

    /// Inserts one aggregated reading. Idempotency is not required; each
    /// window is flushed at most once.
    fn insert(&self, reading: &StoredReading) -> Result<(), StoreError>;
}
