//! Streaming frame decoder.
//!
//! The decoder owns exclusive access to a byte source and runs a two-state
//! scan: discard bytes until a `0x55` start marker (resynchronization), then
//! read the fixed-size remainder of the frame and validate it. A valid frame
//! yields a sample; an invalid one is discarded and scanning resumes. Both
//! outcomes are explicit variants of [`DecodeEvent`], so callers can never
//! mistake a dropped frame for a zero-valued sample.
//!
//! The framing has no marker escaping: a payload byte equal to `0x55` or
//! `0xAA` is indistinguishable from a true marker, so a corrupted stream can
//! momentarily desynchronize the scanner. This is an inherent weakness of
//! the wire format; the scanner recovers at the next genuine frame boundary.

use thiserror::Error;

use crate::Sample;
use crate::protocol::{
    self, ChecksumMode, FrameError, FrameFault, FrameOutcome, layout,
};
use crate::source::{ByteSource, SourceError};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("transport error: {0}")]
    Source(#[from] SourceError),
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
}

/// One decode attempt, as an explicit sum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecodeEvent {
    /// A correctly framed packet; the decoded sample.
    Sample(Sample),
    /// A framed-but-invalid packet was dropped; non-fatal, scan continues.
    Discarded(FrameFault),
    /// The source ended cleanly while scanning for a start marker.
    Finished,
}

/// Counters accumulated across the life of a decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderCounters {
    pub frames_decoded: u64,
    pub frames_discarded: u64,
    pub bad_end_marker: u64,
    pub checksum_mismatch: u64,
    /// Bytes dropped while scanning for a start marker.
    pub bytes_skipped: u64,
}

impl DecoderCounters {
    /// Total bytes consumed from the source, skipped and framed alike.
    pub fn bytes_consumed(&self) -> u64 {
        self.bytes_skipped
            + (layout::FRAME_LEN as u64) * (self.frames_decoded + self.frames_discarded)
    }
}

pub struct FrameDecoder<S> {
    source: S,
    checksum: ChecksumMode,
    counters: DecoderCounters,
}

impl<S: ByteSource> FrameDecoder<S> {
    pub fn new(source: S) -> Self {
        Self::with_checksum(source, ChecksumMode::default())
    }

    pub fn with_checksum(source: S, checksum: ChecksumMode) -> Self {
        Self {
            source,
            checksum,
            counters: DecoderCounters::default(),
        }
    }

    pub fn checksum_mode(&self) -> ChecksumMode {
        self.checksum
    }

    pub fn counters(&self) -> DecoderCounters {
        self.counters
    }

    /// Perform one decode attempt.
    ///
    /// Blocks until a full frame has been scanned, the source ends cleanly,
    /// or the transport fails. Transport failures, including the stream
    /// closing mid-frame, are fatal and never retried here.
    pub fn next_event(&mut self) -> Result<DecodeEvent, DecodeError> {
        loop {
            match self.source.next_byte()? {
                None => return Ok(DecodeEvent::Finished),
                Some(layout::START_MARKER) => break,
                Some(_) => self.counters.bytes_skipped += 1,
            }
        }

        let mut frame = [0u8; layout::FRAME_LEN];
        frame[0] = layout::START_MARKER;
        self.source.read_exact(&mut frame[1..])?;

        match protocol::parse_frame(&frame, self.checksum)? {
            FrameOutcome::Valid(sample) => {
                self.counters.frames_decoded += 1;
                Ok(DecodeEvent::Sample(sample))
            }
            FrameOutcome::Invalid(fault) => {
                self.counters.frames_discarded += 1;
                match fault {
                    FrameFault::EndMarker { .. } => self.counters.bad_end_marker += 1,
                    FrameFault::Checksum { .. } => self.counters.checksum_mismatch += 1,
                    FrameFault::StartMarker { .. } => {}
                }
                Ok(DecodeEvent::Discarded(fault))
            }
        }
    }

    /// Decode until the next sample, skipping over discarded frames.
    ///
    /// `Ok(None)` means the source ended cleanly.
    pub fn next_sample(&mut self) -> Result<Option<Sample>, DecodeError> {
        loop {
            match self.next_event()? {
                DecodeEvent::Sample(sample) => return Ok(Some(sample)),
                DecodeEvent::Discarded(_) => continue,
                DecodeEvent::Finished => return Ok(None),
            }
        }
    }

}
