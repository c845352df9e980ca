//! SDS011 frame decoding.
//!
//! The sensor pushes one 10-byte binary frame per reading:
//!
//! ```text
//! ┌──────┬──────┬────────────────────┬──────────┬──────┐
//! │ 0xAA │ 0xC0 │ d0 d1 d2 d3 d4 d5  │ checksum │ 0xAB │
//! └──────┴──────┴────────────────────┴──────────┴──────┘
//! ```
//!
//! `checksum` is the 8-bit sum of the six data bytes. Concentrations arrive
//! low byte first: `pm25 = (d1*256 + d0) / 10`, `pm10 = (d3*256 + d2) / 10`,
//! both in µg/m³.
//!
//! [`FrameDecoder`] is a byte-at-a-time state machine. Feeding it one byte at
//! a time (rather than issuing nested blocking reads) means a corrupted or
//! misaligned stream self-heals by rescanning for the header pair, and the
//! caller can check for cancellation between bytes.

use serde::{Deserialize, Serialize};

/// First header byte of every frame.
pub const HEADER_1: u8 = 0xAA;
/// Second header byte; 0xC0 marks a measurement report.
pub const HEADER_2: u8 = 0xC0;
/// Fixed trailing byte of every frame.
pub const TAIL: u8 = 0xAB;
/// Total frame length in bytes.
pub const FRAME_LEN: usize = 10;

/// Bytes of a frame after the 2-byte header: 6 data + checksum + tail.
const BODY_LEN: usize = 8;

/// One decoded reading, concentrations in µg/m³.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub pm25: f64,
    pub pm10: f64,
}

/// A structurally complete frame that failed validation.
///
/// Both variants are recoverable: the decoder has already returned to header
/// scanning when one is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Checksum byte does not match the 8-bit sum of the data bytes.
    ChecksumMismatch { expected: u8, actual: u8 },
    /// Tail byte is not [`TAIL`]; frame alignment is not trusted past it.
    BadTail { byte: u8 },
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::ChecksumMismatch { expected, actual } => {
                write!(
                    f,
                    "checksum mismatch: expected {expected:#04x}, got {actual:#04x}"
                )
            }
            FrameError::BadTail { byte } => write!(f, "bad tail byte {byte:#04x}"),
        }
    }
}

impl std::error::Error for FrameError {}

#[derive(Debug, Clone, Copy)]
enum DecodeState {
    /// Scanning for the first header byte.
    SeekHeader1,
    /// First header byte seen, expecting the second.
    SeekHeader2,
    /// Header matched, accumulating the 8-byte body.
    ReadBody { filled: usize },
}

/// Resynchronizing stream decoder for SDS011 frames.
///
/// Feed bytes in arrival order; every complete frame attempt yields either a
/// [`Sample`] or a [`FrameError`]. After an error the decoder resumes
/// scanning for the next header, so a corrupted stream never wedges it.
#[derive(Debug)]
pub struct FrameDecoder {
    state: DecodeState,
    body: [u8; BODY_LEN],
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: DecodeState::SeekHeader1,
            body: [0; BODY_LEN],
        }
    }

    /// Consumes one byte from the stream.
    ///
    /// Returns `Some` when the byte completes a frame attempt, `None` while
    /// more bytes are needed.
    pub fn feed(&mut self, byte: u8) -> Option<Result<Sample, FrameError>> {
        match self.state {
            DecodeState::SeekHeader1 => {
                if byte == HEADER_1 {
                    self.state = DecodeState::SeekHeader2;
                }
                None
            }
            DecodeState::SeekHeader2 => {
                self.state = match byte {
                    HEADER_2 => DecodeState::ReadBody { filled: 0 },
                    // 0xAA again still counts as a candidate first byte.
                    HEADER_1 => DecodeState::SeekHeader2,
                    _ => DecodeState::SeekHeader1,
                };
                None
            }
            DecodeState::ReadBody { filled } => {
                self.body[filled] = byte;
                let filled = filled + 1;
                if filled < BODY_LEN {
                    self.state = DecodeState::ReadBody { filled };
                    return None;
                }
                self.state = DecodeState::SeekHeader1;
                Some(validate_body(&self.body))
            }
        }
    }
}

/// Validates a complete 8-byte frame body (data + checksum + tail).
fn validate_body(body: &[u8; BODY_LEN]) -> Result<Sample, FrameError> {
    let tail = body[7];
    if tail != TAIL {
        return Err(FrameError::BadTail { byte: tail });
    }
    let expected = checksum(&body[..6]);
    if body[6] != expected {
        return Err(FrameError::ChecksumMismatch {
            expected,
            actual: body[6],
        });
    }
    Ok(Sample {
        pm25: f64::from(u16::from_le_bytes([body[0], body[1]])) / 10.0,
        pm10: f64::from(u16::from_le_bytes([body[2], body[3]])) / 10.0,
    })
}

/// Decodes one complete 10-byte frame.
///
/// Pure function over the bytes; used directly by tests and fixtures, the
/// streaming path goes through [`FrameDecoder::feed`].
pub fn decode_frame(frame: &[u8; FRAME_LEN]) -> Result<Sample, FrameError> {
    let mut decoder = FrameDecoder::new();
    for &byte in frame {
        if let Some(result) = decoder.feed(byte) {
            return result;
        }
    }
    // A 10-byte buffer that never completes an attempt did not start with
    // the header pair.
    Err(FrameError::BadTail { byte: frame[9] })
}

/// 8-bit sum of the data bytes.
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Builds a valid frame from raw concentration values (tenths of µg/m³).
///
/// Fixture helper for the synthetic byte source and tests.
pub fn encode_frame(pm25_raw: u16, pm10_raw: u16) -> [u8; FRAME_LEN] {
    let pm25 = pm25_raw.to_le_bytes();
    let pm10 = pm10_raw.to_le_bytes();
    // d4/d5 carry the device id on real hardware; zero here.
    let data = [pm25[0], pm25[1], pm10[0], pm10[1], 0, 0];
    let mut frame = [0u8; FRAME_LEN];
    frame[0] = HEADER_1;
    frame[1] = HEADER_2;
    frame[2..8].copy_from_slice(&data);
    frame[8] = checksum(&data);
    frame[9] = TAIL;
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(decoder: &mut FrameDecoder, bytes: &[u8]) -> Vec<Result<Sample, FrameError>> {
        bytes.iter().filter_map(|&b| decoder.feed(b)).collect()
    }

    #[test]
    fn decodes_hand_constructed_frame() {
        // data = [0x64, 0x00, 0xC8, 0x00, 0x00, 0x00], sum = 0x12C -> 0x2C
        let frame = [0xAA, 0xC0, 0x64, 0x00, 0xC8, 0x00, 0x00, 0x00, 0x2C, 0xAB];

        let sample = decode_frame(&frame).unwrap();

        assert_eq!(sample.pm25, 10.0);
        assert_eq!(sample.pm10, 20.0);
    }

    #[test]
    fn decode_is_idempotent_on_same_bytes() {
        let frame = encode_frame(153, 307);

        let first = decode_frame(&frame).unwrap();
        let second = decode_frame(&frame).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.pm25, 15.3);
        assert_eq!(first.pm10, 30.7);
    }

    #[test]
    fn flipped_checksum_yields_no_sample() {
        let mut frame = encode_frame(100, 200);
        frame[8] ^= 0xFF;

        match decode_frame(&frame) {
            Err(FrameError::ChecksumMismatch { .. }) => {}
            other => panic!("expected checksum mismatch, got {other:?}"),
        }
    }

    #[test]
    fn bad_tail_discards_whole_attempt() {
        let mut frame = encode_frame(100, 200);
        frame[9] = 0x00;

        assert_eq!(decode_frame(&frame), Err(FrameError::BadTail { byte: 0 }));
    }

    #[test]
    fn resynchronizes_after_corrupted_frame() {
        let mut stream = Vec::new();
        let mut bad = encode_frame(1, 2);
        bad[8] ^= 0x01;
        stream.extend_from_slice(&bad);
        stream.extend_from_slice(&encode_frame(250, 500));

        let mut decoder = FrameDecoder::new();
        let results = feed_all(&mut decoder, &stream);

        assert_eq!(results.len(), 2);
        assert!(matches!(
            results[0],
            Err(FrameError::ChecksumMismatch { .. })
        ));
        assert_eq!(results[1], Ok(Sample { pm25: 25.0, pm10: 50.0 }));
    }

    #[test]
    fn scans_past_leading_garbage() {
        let mut stream = vec![0x00, 0xFF, 0xAB, 0xAA, 0x17];
        stream.extend_from_slice(&encode_frame(42, 84));

        let mut decoder = FrameDecoder::new();
        let results = feed_all(&mut decoder, &stream);

        assert_eq!(results, vec![Ok(Sample { pm25: 4.2, pm10: 8.4 })]);
    }

    #[test]
    fn repeated_header_byte_still_matches() {
        // 0xAA 0xAA 0xC0 ... must sync on the second 0xAA.
        let mut stream = vec![0xAA];
        stream.extend_from_slice(&encode_frame(10, 10));

        let mut decoder = FrameDecoder::new();
        let results = feed_all(&mut decoder, &stream);

        assert_eq!(results.len(), 1);
        assert!(results[0].is_ok());
    }

    #[test]
    fn split_delivery_matches_single_delivery() {
        let frame = encode_frame(999, 1);

        let mut whole = FrameDecoder::new();
        let whole_result = feed_all(&mut whole, &frame);

        let mut split = FrameDecoder::new();
        let mut split_results = Vec::new();
        for chunk in frame.chunks(3) {
            split_results.extend(feed_all(&mut split, chunk));
        }

        assert_eq!(whole_result, split_results);
    }

    #[test]
    fn checksum_wraps_at_byte_boundary() {
        assert_eq!(checksum(&[0xFF, 0x02]), 0x01);
        assert_eq!(checksum(&[]), 0);
    }
}
