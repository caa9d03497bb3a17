use crate::Sample;

use super::error::FrameError;
use super::layout;
use super::reader::FrameReader;

/// Checksum handling for frame validation.
///
/// The wire format carries an XOR checksum byte, but the original host
/// software never validated it. `Ignore` preserves that behavior; `Xor`
/// rejects frames whose checksum byte does not match the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumMode {
    #[default]
    Ignore,
    Xor,
}

impl ChecksumMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChecksumMode::Ignore => "ignore",
            ChecksumMode::Xor => "xor",
        }
    }
}

/// Result of decoding one marker-aligned frame.
///
/// `Invalid` is an explicit outcome, never an error: a framed-but-invalid
/// packet is dropped and the stream re-synchronizes at the next start marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    Valid(Sample),
    Invalid(FrameFault),
}

/// Why a framed packet was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFault {
    StartMarker { found: u8 },
    EndMarker { found: u8 },
    Checksum { expected: u8, found: u8 },
}

impl std::fmt::Display for FrameFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameFault::StartMarker { found } => {
                write!(f, "bad start marker: 0x{found:02X}")
            }
            FrameFault::EndMarker { found } => {
                write!(f, "bad end marker: 0x{found:02X}")
            }
            FrameFault::Checksum { expected, found } => {
                write!(f, "checksum mismatch: expected 0x{expected:02X}, got 0x{found:02X}")
            }
        }
    }
}

/// Decode one 11-byte telemetry frame.
///
/// The buffer must hold a complete frame starting at the start marker.
/// Returns `FrameOutcome::Invalid` for well-sized frames with bad markers or
/// (in `Xor` mode) a bad checksum; `FrameError::TooShort` for undersized
/// buffers.
pub fn parse_frame(frame: &[u8], checksum: ChecksumMode) -> Result<FrameOutcome, FrameError> {
    let reader = FrameReader::new(frame);
    reader.require_len(layout::FRAME_LEN)?;

    let start = reader.read_u8(0)?;
    if start != layout::START_MARKER {
        return Ok(FrameOutcome::Invalid(FrameFault::StartMarker { found: start }));
    }

    let end = reader.read_u8(layout::END_MARKER_OFFSET)?;
    if end != layout::END_MARKER {
        return Ok(FrameOutcome::Invalid(FrameFault::EndMarker { found: end }));
    }

    if checksum == ChecksumMode::Xor {
        let expected = xor_checksum(reader.read_slice(layout::CHECKSUM_COVERAGE)?);
        let found = reader.read_u8(layout::CHECKSUM_OFFSET)?;
        if expected != found {
            return Ok(FrameOutcome::Invalid(FrameFault::Checksum { expected, found }));
        }
    }

    let distance_cm = reader.read_f32_le(layout::DISTANCE_RANGE)?;
    let light_level = reader.read_u32_le(layout::LIGHT_RANGE)?;

    Ok(FrameOutcome::Valid(Sample {
        distance_cm,
        light_level,
    }))
}

/// Encode a sample into its 11-byte wire frame.
///
/// The checksum byte is always computed, so encoded frames decode under both
/// checksum modes.
pub fn encode_sample(sample: &Sample) -> [u8; layout::FRAME_LEN] {
    let mut frame = [0u8; layout::FRAME_LEN];
    frame[0] = layout::START_MARKER;
    frame[layout::DISTANCE_RANGE].copy_from_slice(&sample.distance_cm.to_le_bytes());
    frame[layout::LIGHT_RANGE].copy_from_slice(&sample.light_level.to_le_bytes());
    frame[layout::CHECKSUM_OFFSET] = xor_checksum(&frame[layout::CHECKSUM_COVERAGE]);
    frame[layout::END_MARKER_OFFSET] = layout::END_MARKER;
    frame
}

/// XOR of the covered bytes (start marker + payload), as computed by the
/// transmitting firmware.
pub fn xor_checksum(covered: &[u8]) -> u8 {
    covered.iter().fold(0, |acc, byte| acc ^ byte)
}
