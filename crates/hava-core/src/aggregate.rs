//! Windowed running average of decoded samples.
//!
//! One window accumulates between two consecutive flushes. The average is
//! updated incrementally per sample — no raw samples or sums are retained, so
//! memory stays O(1) no matter how fast the sensor reports.

use chrono::{DateTime, Utc};

use crate::sensor::Sample;
use crate::store::StoredReading;

/// Incremental mean of all samples folded in since `window_start`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateWindow {
    count: u32,
    avg_pm25: f64,
    avg_pm10: f64,
    window_start: DateTime<Utc>,
}

impl AggregateWindow {
    /// Opens an empty window starting now.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            avg_pm25: 0.0,
            avg_pm10: 0.0,
            window_start: now,
        }
    }

    /// Folds one sample into the running mean.
    ///
    /// Uses the rescaling form `avg*(n-1)/n + v/n` rather than a sum/count
    /// pair; the first sample after a reset sets the average directly.
    pub fn fold(&mut self, sample: Sample) {
        self.count += 1;
        if self.count == 1 {
            self.avg_pm25 = sample.pm25;
            self.avg_pm10 = sample.pm10;
            return;
        }
        let n = f64::from(self.count);
        self.avg_pm25 = self.avg_pm25 * (n - 1.0) / n + sample.pm25 / n;
        self.avg_pm10 = self.avg_pm10 * (n - 1.0) / n + sample.pm10 / n;
    }

    /// Reopens the window seeded with the sample that triggered the flush.
    ///
    /// The new window starts at count = 1 with that sample's values, never
    /// empty — the first fold after a flush therefore averages against a
    /// real reading instead of a stale count.
    pub fn reset_with_seed(&mut self, seed: Sample, now: DateTime<Utc>) {
        self.count = 1;
        self.avg_pm25 = seed.pm25;
        self.avg_pm10 = seed.pm10;
        self.window_start = now;
    }

    /// Snapshot of the current averages, rounded to 2 decimal places.
    pub fn snapshot(&self, measured_at: DateTime<Utc>) -> StoredReading {
        StoredReading {
            measured_at,
            pm25: round2(self.avg_pm25),
            pm10: round2(self.avg_pm10),
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn window_start(&self) -> DateTime<Utc> {
        self.window_start
    }

    pub fn avg_pm25(&self) -> f64 {
        self.avg_pm25
    }

    pub fn avg_pm10(&self) -> f64 {
        self.avg_pm10
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
