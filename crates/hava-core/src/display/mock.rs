//! Recording display sink for tests.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use super::{DisplayError, DisplaySink};

/// Captures every rendered sample; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct RecordingDisplay {
    rendered: Arc<Mutex<Vec<(DateTime<Utc>, f64, f64)>>>,
    fail_init: bool,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Display whose init fails, for startup-abort tests.
    pub fn failing_init() -> Self {
        Self {
            fail_init: true,
            ..Self::default()
        }
    }

    pub fn rendered(&self) -> Vec<(DateTime<Utc>, f64, f64)> {
        self.rendered.lock().unwrap().clone()
    }

    pub fn render_count(&self) -> usize {
        self.rendered.lock().unwrap().len()
    }
}

impl DisplaySink for RecordingDisplay {
    fn init(&mut self) -> Result<(), DisplayError> {
        if self.fail_init {
            return Err(DisplayError("injected init failure".into()));
        }
        Ok(())
    }

    fn render(&mut self, measured_at: DateTime<Utc>, pm25: f64, pm10: f64) {
        self.rendered
            .lock()
            .unwrap()
            .push((measured_at, pm25, pm10));
    }
}
