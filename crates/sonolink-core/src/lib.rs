//! SonoLink core library for serial telemetry decoding.
//!
//! This crate implements the decoding pipeline used by the CLI: byte sources
//! (live serial port or raw log replay) feed the streaming frame decoder,
//! which drives the capture layer to aggregate samples, per-channel stats
//! and integrity counters into a deterministic report. Frame parsing is
//! byte-oriented and side-effect free; all I/O is isolated in `source`
//! modules. Wire-format conventions are captured in the protocol reader so
//! the parser stays minimal.
//!
//! Invariants:
//! - A sample is only produced from bytes framed by a correctly positioned
//!   `0x55 ... 0xAA` marker pair.
//! - Invalid frames are explicit, non-fatal outcomes; transport failures are
//!   fatal and propagated. Neither is ever conflated with a valid sample.
//! - A decoder holds exclusive access to its byte source.
//! - Report outputs have deterministic field order.
//!
//! Version française (résumé):
//! Cette crate fournit le cœur de décodage : sources d'octets (port série ou
//! rejeu de journal brut) -> décodeur de trames -> agrégation en rapport
//! déterministe. Les E/S restent dans `source`, les conventions du format
//! dans le module protocole. Une trame invalide est un résultat explicite,
//! jamais une erreur ; une panne de transport est fatale et propagée.
//!
//! # Examples
//! ```
//! use std::io::Cursor;
//!
//! use sonolink_core::{DecodeEvent, FrameDecoder, ReadSource};
//!
//! let bytes = vec![
//!     0x55, 0x00, 0x00, 0x20, 0x41, 0x2A, 0x00, 0x00, 0x00, 0x00, 0xAA,
//! ];
//! let mut decoder = FrameDecoder::new(ReadSource::new(Cursor::new(bytes)));
//! match decoder.next_event()? {
//!     DecodeEvent::Sample(sample) => {
//!         assert_eq!(sample.distance_cm, 10.0);
//!         assert_eq!(sample.light_level, 42);
//!     }
//!     other => panic!("expected a sample, got {other:?}"),
//! }
//! # Ok::<(), sonolink_core::DecodeError>(())
//! ```

use serde::{Deserialize, Serialize};

mod capture;
mod decoder;
mod history;
mod protocol;
mod source;
mod stream;

pub use capture::{CaptureError, CaptureOptions, DEFAULT_RETAIN, capture_report, replay_log_file};
pub use decoder::{DecodeError, DecodeEvent, DecoderCounters, FrameDecoder};
pub use history::SampleHistory;
pub use protocol::layout::{END_MARKER, FRAME_LEN, START_MARKER};
pub use protocol::{
    ChecksumMode, FrameError, FrameFault, FrameOutcome, encode_sample, parse_frame, xor_checksum,
};
pub use source::{
    ByteSource, CancelToken, DataBits, Parity, RawLogSource, ReadSource, SerialConfig,
    SerialPortSource, SourceError, StopBits,
};
pub use stream::{SampleStream, StreamEvent};

/// Current report schema version.
pub const REPORT_VERSION: u32 = 1;
/// Default timestamp used when no wall-clock time is available.
pub const DEFAULT_GENERATED_AT: &str = "1970-01-01T00:00:00Z";

/// One decoded telemetry reading pair.
///
/// Immutable once decoded; the distance is the ultrasonic range in
/// centimeters, the light level the raw photo-sensor ADC value.
///
/// # Examples
/// ```
/// use sonolink_core::Sample;
///
/// let sample = Sample {
///     distance_cm: 12.5,
///     light_level: 640,
/// };
/// assert_eq!(sample.light_level, 640);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Ultrasonic distance reading in centimeters.
    pub distance_cm: f32,
    /// Photo-sensor reading (raw ADC counts).
    pub light_level: u32,
}

/// Aggregated capture report with deterministic ordering.
///
/// # Examples
/// ```
/// use sonolink_core::make_base_report;
///
/// let report = make_base_report("/dev/ttyUSB0");
/// assert_eq!(report.report_version, sonolink_core::REPORT_VERSION);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Report schema version (not the binary version).
    pub report_version: u32,
    /// Tool identification metadata.
    pub tool: ToolInfo,
    /// RFC3339 timestamp representing the report generation time.
    pub generated_at: String,

    /// Input source metadata.
    pub input: InputInfo,

    /// Capture totals and time bounds.
    pub summary: CaptureSummary,
    /// Distance channel stats; absent when no samples were decoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<DistanceStats>,
    /// Light channel stats; absent when no samples were decoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub light: Option<LightStats>,
    /// Frame integrity counters.
    pub integrity: IntegritySummary,
    /// Retained window of most recent samples, oldest first.
    pub samples: Vec<SampleRecord>,
}

/// Tool metadata embedded in reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool name (e.g., "sonolink").
    pub name: String,
    /// Tool version (semver).
    pub version: String,
}

/// Input source metadata embedded in reports.
///
/// # Examples
/// ```
/// use sonolink_core::InputInfo;
///
/// let input = InputInfo {
///     source: "telemetry.bin".to_string(),
///     bytes_consumed: 44,
/// };
/// assert_eq!(input.bytes_consumed, 44);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputInfo {
    /// Input identity as provided: a log path or a serial port name.
    pub source: String,
    /// Bytes consumed from the source, skipped and framed alike.
    pub bytes_consumed: u64,
}

/// Capture totals (time bounds may be absent for replayed logs).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSummary {
    /// Samples decoded from valid frames.
    pub samples_total: u64,
    /// Framed-but-invalid packets dropped.
    pub frames_discarded: u64,
    /// Bytes dropped while scanning for a start marker.
    pub bytes_skipped: u64,
    /// RFC3339 timestamp of the first sample (if stamped).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_start: Option<String>,
    /// RFC3339 timestamp of the last sample (if stamped).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_end: Option<String>,
}

/// Distance channel aggregates, in centimeters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistanceStats {
    pub min_cm: f32,
    pub max_cm: f32,
    pub mean_cm: f64,
    pub last_cm: f32,
}

/// Light channel aggregates, in raw ADC counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightStats {
    pub min: u32,
    pub max: u32,
    pub mean: f64,
    pub last: u32,
}

/// Frame integrity counters, with the checksum policy that produced them.
///
/// # Examples
/// ```
/// use sonolink_core::IntegritySummary;
///
/// let integrity = IntegritySummary {
///     frames_decoded: 10,
///     frames_discarded: 1,
///     bad_end_marker: 1,
///     checksum_mismatch: 0,
///     bytes_skipped: 3,
///     checksum_mode: "ignore".to_string(),
/// };
/// assert_eq!(integrity.frames_discarded, 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegritySummary {
    pub frames_decoded: u64,
    pub frames_discarded: u64,
    pub bad_end_marker: u64,
    pub checksum_mismatch: u64,
    pub bytes_skipped: u64,
    /// Checksum policy in force: "ignore" or "xor".
    pub checksum_mode: String,
}

/// One retained sample, with its position in the capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleRecord {
    /// Zero-based decode order of the sample within the capture.
    pub seq: u64,
    /// RFC3339 arrival time (live captures only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received_at: Option<String>,
    pub distance_cm: f32,
    pub light_level: u32,
}

/// Build a report with base fields filled and empty aggregates.
///
/// # Examples
/// ```
/// use sonolink_core::make_base_report;
///
/// let report = make_base_report("telemetry.bin");
/// assert!(report.samples.is_empty());
/// assert!(report.distance.is_none());
/// ```
pub fn make_base_report(source: &str) -> Report {
    Report {
        report_version: REPORT_VERSION,
        tool: ToolInfo {
            name: "sonolink".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        generated_at: DEFAULT_GENERATED_AT.to_string(),
        input: InputInfo {
            source: source.to_string(),
            bytes_consumed: 0,
        },
        summary: CaptureSummary {
            samples_total: 0,
            frames_discarded: 0,
            bytes_skipped: 0,
            time_start: None,
            time_end: None,
        },
        distance: None,
        light: None,
        integrity: IntegritySummary {
            frames_decoded: 0,
            frames_discarded: 0,
            bad_end_marker: 0,
            checksum_mismatch: 0,
            bytes_skipped: 0,
            checksum_mode: ChecksumMode::default().as_str().to_string(),
        },
        samples: vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_omits_optional_fields_when_none() {
        let mut report = make_base_report("telemetry.bin");
        report.samples.push(SampleRecord {
            seq: 0,
            received_at: None,
            distance_cm: 1.0,
            light_level: 2,
        });

        let value = serde_json::to_value(&report).expect("report json");
        assert!(value.get("distance").is_none());
        assert!(value.get("light").is_none());

        let summary = value.get("summary").expect("summary");
        assert!(summary.get("time_start").is_none());
        assert!(summary.get("time_end").is_none());

        let sample = &value["samples"][0];
        assert!(sample.get("received_at").is_none());
        assert_eq!(sample["seq"], 0);
    }

    #[test]
    fn report_round_trips_through_json() {
        let mut report = make_base_report("/dev/ttyACM0");
        report.summary.samples_total = 3;
        report.light = Some(LightStats {
            min: 1,
            max: 9,
            mean: 4.0,
            last: 9,
        });

        let json = serde_json::to_string(&report).expect("serialize");
        let parsed: Report = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.summary.samples_total, 3);
        assert_eq!(parsed.light.as_ref().map(|l| l.max), Some(9));
        assert!(parsed.distance.is_none());
    }
}
