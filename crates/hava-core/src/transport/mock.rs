//! Byte sources that need no hardware.
//!
//! [`ScriptedByteSource`] replays a fixed byte script for tests.
//! [`SyntheticByteSource`] generates plausible frames at the sensor's real
//! 1 Hz cadence so the daemon can run end to end without a device
//! (`havad --mock-sensor`).

use std::collections::VecDeque;
use std::thread;
use std::time::Duration;

use crate::sensor::encode_frame;

use super::{ByteSource, TransportError};

/// Replays a scripted sequence of byte chunks and errors, in order.
///
/// Once the script is exhausted every read times out, like a silent sensor.
#[derive(Debug, Default)]
pub struct ScriptedByteSource {
    script: VecDeque<Result<Vec<u8>, TransportError>>,
}

impl ScriptedByteSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends raw bytes to the script.
    pub fn with_bytes(mut self, bytes: Vec<u8>) -> Self {
        self.script.push_back(Ok(bytes));
        self
    }

    /// Appends one valid frame built from raw tenth-µg/m³ values.
    pub fn with_frame(self, pm25_raw: u16, pm10_raw: u16) -> Self {
        let frame = encode_frame(pm25_raw, pm10_raw);
        self.with_bytes(frame.to_vec())
    }

    /// Appends a transport error to the script.
    pub fn with_error(mut self, error: TransportError) -> Self {
        self.script.push_back(Err(error));
        self
    }
}

impl ByteSource for ScriptedByteSource {
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        match self.script.pop_front() {
            Some(Ok(mut bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    // Requeue what did not fit so nothing is lost.
                    self.script.push_front(Ok(bytes.split_off(n)));
                }
                Ok(n)
            }
            Some(Err(e)) => Err(e),
            None => {
                // Keep the cadence of a real timed-out read without burning
                // a core in tests.
                thread::sleep(Duration::from_millis(5));
                Err(TransportError::TimedOut)
            }
        }
    }

    fn device(&self) -> &str {
        "mock:scripted"
    }
}

/// Emits one well-formed frame per second with slowly wobbling values.
pub struct SyntheticByteSource {
    tick: u64,
    interval: Duration,
}

impl SyntheticByteSource {
    pub fn new() -> Self {
        Self {
            tick: 0,
            interval: Duration::from_secs(1),
        }
    }

    /// Overrides the 1 Hz cadence (tests use a shorter interval).
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

impl Default for SyntheticByteSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteSource for SyntheticByteSource {
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        thread::sleep(self.interval);
        self.tick += 1;
        // Triangle wave around typical urban levels, in tenths of µg/m³.
        let phase = (self.tick % 40) as i64;
        let wobble = (phase - 20).abs() as u16;
        let pm25_raw = 120 + 3 * wobble;
        let pm10_raw = 250 + 5 * wobble;
        let frame = encode_frame(pm25_raw, pm10_raw);
        let n = frame.len().min(buf.len());
        buf[..n].copy_from_slice(&frame[..n]);
        Ok(n)
    }

    fn device(&self) -> &str {
        "mock:synthetic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{FRAME_LEN, FrameDecoder};

    #[test]
    fn scripted_source_replays_chunks_in_order() {
        let mut source = ScriptedByteSource::new()
            .with_bytes(vec![1, 2, 3])
            .with_error(TransportError::Closed);
        let mut buf = [0u8; 8];

        assert_eq!(source.read_bytes(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
        assert!(matches!(
            source.read_bytes(&mut buf),
            Err(TransportError::Closed)
        ));
        assert!(matches!(
            source.read_bytes(&mut buf),
            Err(TransportError::TimedOut)
        ));
    }

    #[test]
    fn scripted_source_requeues_overflow() {
        let mut source = ScriptedByteSource::new().with_bytes(vec![1, 2, 3, 4, 5]);
        let mut buf = [0u8; 2];

        assert_eq!(source.read_bytes(&mut buf).unwrap(), 2);
        assert_eq!(&buf, &[1, 2]);
        assert_eq!(source.read_bytes(&mut buf).unwrap(), 2);
        assert_eq!(&buf, &[3, 4]);
        assert_eq!(source.read_bytes(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 5);
    }

    #[test]
    fn synthetic_source_produces_decodable_frames() {
        let mut source = SyntheticByteSource::new().with_interval(Duration::from_millis(1));
        let mut buf = [0u8; FRAME_LEN];
        let mut decoder = FrameDecoder::new();

        source.read_bytes(&mut buf).unwrap();
        let decoded: Vec<_> = buf.iter().filter_map(|&b| decoder.feed(b)).collect();

        assert_eq!(decoded.len(), 1);
        let sample = decoded[0].as_ref().unwrap();
        assert!(sample.pm25 > 0.0 && sample.pm10 > sample.pm25);
    }
}
