use std::io::{ErrorKind, Read};
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort};

pub use serialport::{DataBits, Parity, StopBits};

use super::{ByteSource, CancelToken, SourceError};

/// Serial link configuration. Defaults match the transmitting firmware:
/// 9600 baud, 8 data bits, 1 stop bit, no parity.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
    /// Read timeout for one OS-level read. The source retries timed-out
    /// reads internally, so this bounds cancellation latency, not the
    /// blocking contract.
    pub read_timeout: Duration,
}

impl SerialConfig {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            read_timeout: Duration::from_millis(100),
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }
}

/// Live byte source over a serial port.
///
/// Owns the port exclusively. Pending input is discarded on open so decoding
/// starts from the live stream rather than a stale driver buffer.
pub struct SerialPortSource {
    port: Box<dyn SerialPort>,
    cancel: CancelToken,
}

impl SerialPortSource {
    pub fn open(config: &SerialConfig) -> Result<Self, SourceError> {
        let port = serialport::new(&config.port, config.baud_rate)
            .data_bits(config.data_bits)
            .stop_bits(config.stop_bits)
            .parity(config.parity)
            .timeout(config.read_timeout)
            .open()
            .map_err(|err| SourceError::Serial {
                context: "open",
                message: err.to_string(),
            })?;
        port.clear(ClearBuffer::Input)
            .map_err(|err| SourceError::Serial {
                context: "clear input",
                message: err.to_string(),
            })?;
        Ok(Self {
            port,
            cancel: CancelToken::new(),
        })
    }

    /// Token that ends the stream cleanly from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Read at least one byte, retrying timed-out reads until data arrives
    /// or the token is cancelled (returns 0).
    fn read_retrying(&mut self, buf: &mut [u8]) -> Result<usize, SourceError> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(0);
            }
            match self.port.read(buf) {
                Ok(0) => continue,
                Ok(n) => return Ok(n),
                Err(err)
                    if err.kind() == ErrorKind::TimedOut
                        || err.kind() == ErrorKind::Interrupted =>
                {
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

impl ByteSource for SerialPortSource {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), SourceError> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read_retrying(&mut buf[filled..])?;
            if n == 0 {
                // Cancelled mid-frame: surfaced as a truncated read, the
                // same contract as a transport closing mid-packet.
                return Err(SourceError::UnexpectedEof {
                    needed: buf.len(),
                    got: filled,
                });
            }
            filled += n;
        }
        Ok(())
    }

    fn next_byte(&mut self) -> Result<Option<u8>, SourceError> {
        let mut byte = [0u8; 1];
        let n = self.read_retrying(&mut byte)?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(byte[0]))
    }
}
