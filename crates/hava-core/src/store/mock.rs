//! In-memory store sink for tests.

use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex};

use super::{StoreError, StoreSink, StoredReading};

/// Recording store with optional failure injection and insert gating.
#[derive(Default)]
pub struct MemoryStore {
    readings: Mutex<Vec<StoredReading>>,
    probe_error: Option<String>,
    insert_error: Option<String>,
    /// When present, each insert blocks until the test sends one unit.
    gate: Option<Mutex<Receiver<()>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose probe always fails, for startup-abort tests.
    pub fn failing_probe(message: impl Into<String>) -> Self {
        Self {
            probe_error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Store whose inserts always fail.
    pub fn failing_insert(message: impl Into<String>) -> Self {
        Self {
            insert_error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Store whose inserts block until the returned sender releases them.
    ///
    /// Dropping the sender releases all pending and future inserts, so a
    /// forgotten gate cannot hang a test on shutdown.
    pub fn gated() -> (Arc<Self>, Sender<()>) {
        let (tx, rx) = channel();
        let store = Arc::new(Self {
            gate: Some(Mutex::new(rx)),
            ..Self::default()
        });
        (store, tx)
    }

    /// Readings inserted so far, in insertion order.
    pub fn readings(&self) -> Vec<StoredReading> {
        self.readings.lock().unwrap().clone()
    }

    pub fn insert_count(&self) -> usize {
        self.readings.lock().unwrap().len()
    }
}

impl StoreSink for MemoryStore {
    fn probe(&self) -> Result<u64, StoreError> {
        if let Some(msg) = &self.probe_error {
            return Err(StoreError::Unreachable(msg.clone()));
        }
        Ok(self.insert_count() as u64)
    }

    fn insert(&self, reading: &StoredReading) -> Result<(), StoreError> {
        if let Some(gate) = &self.gate {
            // Err means the test dropped the sender; treat as released.
            let _ = gate.lock().unwrap().recv();
        }
        if let Some(msg) = &self.insert_error {
            return Err(StoreError::Write(msg.clone()));
        }
        self.readings.lock().unwrap().push(*reading);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn records_inserts_in_order() {
        let store = MemoryStore::new();
        for i in 0..3 {
            store
                .insert(&StoredReading {
                    measured_at: DateTime::from_timestamp(i, 0).unwrap(),
                    pm25: i as f64,
                    pm10: i as f64,
                })
                .unwrap();
        }

        let readings = store.readings();
        assert_eq!(readings.len(), 3);
        assert_eq!(readings[2].measured_at.timestamp(), 2);
        assert_eq!(store.probe().unwrap(), 3);
    }

    #[test]
    fn failing_probe_reports_unreachable() {
        let store = MemoryStore::failing_probe("no route");
        assert!(matches!(store.probe(), Err(StoreError::Unreachable(_))));
    }
}
