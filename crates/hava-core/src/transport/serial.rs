//! Serial byte source for the physical sensor.
//!
//! The SDS011 reports at 1 Hz over 9600 8N1; the read timeout doubles as the
//! cancellation check interval for the reader worker.

use std::io::Read;
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::info;

use super::{ByteSource, TransportError};

const BAUD_RATE: u32 = 9600;
const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Blocking byte source backed by a serial port.
pub struct SerialByteSource {
    port: Box<dyn SerialPort>,
    device: String,
}

impl SerialByteSource {
    /// Opens the given device at the sensor's fixed parameters.
    pub fn open(device: &str) -> Result<Self, TransportError> {
        let port = serialport::new(device, BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| TransportError::Open(e.to_string()))?;
        info!("opened serial port {}", device);
        Ok(Self {
            port,
            device: device.to_string(),
        })
    }
}

impl ByteSource for SerialByteSource {
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Err(TransportError::TimedOut),
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Err(TransportError::Closed),
            Err(e) => Err(TransportError::Io(e.to_string())),
        }
    }

    fn device(&self) -> &str {
        &self.device
    }
}
