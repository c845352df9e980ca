//! PostgreSQL store sink.
//!
//! Readings land in the `air` table:
//!
//! ```sql
//! CREATE TABLE air (
//!     created_at BIGINT NOT NULL,
//!     pm25       DOUBLE PRECISION NOT NULL,
//!     pm10       DOUBLE PRECISION NOT NULL
//! );
//! ```
//!
//! A connection is opened per operation. Flushes happen about once a minute,
//! so holding a connection across the sampling loop buys nothing and a
//! per-call connect keeps the sink `Sync` without locking.

use std::time::Duration;

use postgres::{Client, NoTls};
use tracing::debug;

use super::{StoreError, StoreSink, StoredReading};

/// Upper bound on connect time so a shutdown waiting on an in-flight flush
/// cannot hang on an unreachable server.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Store sink backed by a PostgreSQL endpoint.
pub struct PostgresStore {
    uri: String,
}

impl PostgresStore {
    /// Creates a sink for the given connection URI
    /// (e.g. `postgres://user@host/air`). No connection is made until
    /// [`StoreSink::probe`] or [`StoreSink::insert`].
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }

    fn connect(&self) -> Result<Client, StoreError> {
        let mut config = self
            .uri
            .parse::<postgres::Config>()
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;
        config.connect_timeout(CONNECT_TIMEOUT);
        config
            .connect(NoTls)
            .map_err(|e| StoreError::Unreachable(e.to_string()))
    }
}

impl StoreSink for PostgresStore {
    fn probe(&self) -> Result<u64, StoreError> {
        let mut client = self.connect()?;
        let row = client
            .query_one("SELECT count(*) FROM air", &[])
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;
        let count: i64 = row.get(0);
        debug!("store probe ok, {} readings present", count);
        Ok(count.max(0) as u64)
    }

    fn insert(&self, reading: &StoredReading) -> Result<(), StoreError> {
        let mut client = self.connect()?;
        let created_at = reading.measured_at.timestamp();
        client
            .execute(
                "INSERT INTO air (created_at, pm25, pm10) VALUES ($1, $2, $3)",
                &[&created_at, &reading.pm25, &reading.pm10],
            )
            .map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(())
    }
}
