//! Byte transport seam and the dedicated reader worker.
//!
//! The physical serial read is a blocking call. It is isolated onto exactly
//! one worker thread so it can never stall the sampling loop, and results are
//! delivered through a single-slot channel — the worker cannot start piling
//! up readings faster than the loop consumes them, and at most one read
//! outcome is ever outstanding.

pub mod mock;
pub mod serial;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, sync_channel};
use std::thread;

use tracing::{debug, warn};

use crate::sensor::{FrameDecoder, FrameError, Sample};

/// Error type for the byte transport.
#[derive(Debug, Clone)]
pub enum TransportError {
    /// Device could not be opened.
    Open(String),
    /// Read failed.
    Io(String),
    /// No bytes arrived within the read timeout.
    TimedOut,
    /// Transport is gone (device unplugged, channel closed).
    Closed,
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Open(msg) => write!(f, "failed to open transport: {msg}"),
            TransportError::Io(msg) => write!(f, "transport read failed: {msg}"),
            TransportError::TimedOut => write!(f, "transport read timed out"),
            TransportError::Closed => write!(f, "transport closed"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Blocking source of raw sensor bytes, configured by a device identifier.
pub trait ByteSource: Send {
    /// Blocking read of whatever bytes are available, up to `buf.len()`.
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Device identifier for log messages.
    fn device(&self) -> &str;
}

/// Anything that can go wrong between the wire and a decoded sample.
///
/// Both variants are recoverable at the scheduler level: log, back off,
/// keep sampling.
#[derive(Debug, Clone)]
pub enum ReadError {
    Frame(FrameError),
    Transport(TransportError),
}

impl std::fmt::Display for ReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadError::Frame(e) => write!(f, "{e}"),
            ReadError::Transport(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ReadError {}

impl From<FrameError> for ReadError {
    fn from(e: FrameError) -> Self {
        ReadError::Frame(e)
    }
}

impl From<TransportError> for ReadError {
    fn from(e: TransportError) -> Self {
        ReadError::Transport(e)
    }
}

/// Handle to the reader thread.
pub struct ReaderWorker {
    handle: thread::JoinHandle<()>,
}

impl ReaderWorker {
    /// Waits for the reader thread to exit.
    ///
    /// The thread notices the closing flag after at most one blocked read
    /// (bounded by the transport's read timeout) or when the event receiver
    /// is dropped.
    pub fn join(self) {
        if self.handle.join().is_err() {
            warn!("reader worker panicked");
        }
    }
}

/// Spawns the dedicated reader worker.
///
/// The worker owns the byte source and the frame decoder; it reads, feeds
/// the decoder, and pushes each completed decode attempt (sample or error)
/// into the returned channel. The channel holds one slot, so the worker
/// blocks until the sampling loop has taken the previous result.
pub fn spawn_reader(
    mut source: Box<dyn ByteSource>,
    closing: Arc<AtomicBool>,
) -> (ReaderWorker, Receiver<Result<Sample, ReadError>>) {
    let (tx, rx) = sync_channel::<Result<Sample, ReadError>>(1);

    let handle = thread::spawn(move || {
        let mut decoder = FrameDecoder::new();
        let mut buf = [0u8; 64];
        debug!("reader worker started on {}", source.device());
        while !closing.load(Ordering::SeqCst) {
            match source.read_bytes(&mut buf) {
                Ok(0) => continue,
                Ok(n) => {
                    for &byte in &buf[..n] {
                        if let Some(result) = decoder.feed(byte) {
                            let event = result.map_err(ReadError::from);
                            if tx.send(event).is_err() {
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    if tx.send(Err(ReadError::Transport(e))).is_err() {
                        return;
                    }
                }
            }
        }
        debug!("reader worker stopped");
    });

    (ReaderWorker { handle }, rx)
}
