//! Byte sources feeding the frame decoder.
//!
//! A source is the external "line" collaborator: an ordered, blocking stream
//! of raw bytes with exactly one logical reader. Implementations isolate all
//! I/O here so the decoder stays pure byte-scanning logic.

mod file;
mod serial;

pub use file::{RawLogSource, ReadSource};
pub use serial::{DataBits, Parity, SerialConfig, SerialPortSource, StopBits};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

/// Blocking byte access with a distinguishable clean end of stream.
///
/// `read_exact` either fills the buffer or fails; running out of bytes
/// mid-read is `SourceError::UnexpectedEof`, a fatal transport error. A
/// clean end of stream is only observable between reads, via `next_byte`.
pub trait ByteSource {
    /// Fill `buf` completely or fail with a transport error.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), SourceError>;

    /// Read one byte, blocking until it is available. `Ok(None)` means the
    /// stream ended cleanly (log exhausted, or a cancelled live port).
    fn next_byte(&mut self) -> Result<Option<u8>, SourceError>;
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serial error ({context}): {message}")]
    Serial {
        context: &'static str,
        message: String,
    },
    #[error("stream closed mid-read: need {needed} bytes, got {got}")]
    UnexpectedEof { needed: usize, got: usize },
}

/// Shared flag that turns a blocking source into a clean end of stream.
///
/// Cloned into the reader side; any holder may cancel. Live sources check
/// the flag between read-timeout windows, so cancellation takes effect
/// within one timeout period.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::CancelToken;

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
