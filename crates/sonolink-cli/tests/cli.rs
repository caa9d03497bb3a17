use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use serde_json::Value;
use tempfile::TempDir;

use sonolink_core::{FRAME_LEN, Sample, encode_sample};

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("sonolink"))
}

/// Three valid frames with two bytes of leading noise.
fn clean_log() -> Vec<u8> {
    let mut bytes = vec![0x17, 0x5A];
    for (distance_cm, light_level) in [(10.0, 42), (11.5, 50), (9.25, 38)] {
        bytes.extend_from_slice(&encode_sample(&Sample {
            distance_cm,
            light_level,
        }));
    }
    bytes
}

/// A clean log plus one frame with a corrupt end marker and one with a
/// corrupt checksum byte.
fn faulty_log() -> Vec<u8> {
    let mut bytes = clean_log();
    let mut bad_end = encode_sample(&Sample {
        distance_cm: 1.0,
        light_level: 1,
    });
    bad_end[FRAME_LEN - 1] = 0x00;
    bytes.extend_from_slice(&bad_end);

    let mut bad_checksum = encode_sample(&Sample {
        distance_cm: 2.0,
        light_level: 2,
    });
    bad_checksum[FRAME_LEN - 2] ^= 0xFF;
    bytes.extend_from_slice(&bad_checksum);
    bytes
}

fn write_log(temp: &TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = temp.path().join(name);
    std::fs::write(&path, bytes).expect("write log fixture");
    path
}

#[test]
fn help_supports_decode_and_replay() {
    cmd()
        .arg("log")
        .arg("decode")
        .arg("--help")
        .assert()
        .success();
    cmd()
        .arg("log")
        .arg("replay")
        .arg("--help")
        .assert()
        .success();
}

#[test]
fn missing_input_shows_error_and_hint() {
    let temp = TempDir::new().expect("tempdir");
    let missing = temp.path().join("missing.bin");
    let report = temp.path().join("report.json");

    cmd()
        .arg("log")
        .arg("decode")
        .arg(missing)
        .arg("-o")
        .arg(report)
        .assert()
        .failure()
        .stderr(contains("error:").and(contains("hint:")));
}

#[test]
fn unsupported_extension_is_rejected() {
    let temp = TempDir::new().expect("tempdir");
    let input = write_log(&temp, "capture.json", &clean_log());
    let report = temp.path().join("report.json");

    cmd()
        .arg("log")
        .arg("decode")
        .arg(input)
        .arg("-o")
        .arg(report)
        .assert()
        .failure()
        .stderr(contains("unsupported input format"));
}

#[test]
fn stdout_outputs_json() {
    let temp = TempDir::new().expect("tempdir");
    let input = write_log(&temp, "capture.bin", &clean_log());

    let assert = cmd()
        .arg("log")
        .arg("decode")
        .arg(input)
        .arg("--stdout")
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 stdout");
    let report: Value = serde_json::from_str(&stdout).expect("valid json");

    assert_eq!(report["summary"]["samples_total"], 3);
    assert_eq!(report["summary"]["bytes_skipped"], 2);
    assert_eq!(report["integrity"]["checksum_mode"], "ignore");
    assert_eq!(report["samples"][0]["light_level"], 42);
}

#[test]
fn report_is_written_to_file() {
    let temp = TempDir::new().expect("tempdir");
    let input = write_log(&temp, "capture.bin", &clean_log());
    let report = temp.path().join("report.json");

    cmd()
        .arg("log")
        .arg("decode")
        .arg(input)
        .arg("-o")
        .arg(&report)
        .assert()
        .success()
        .stderr(contains("OK: report written"));

    let contents = std::fs::read_to_string(&report).expect("read report");
    let parsed: Value = serde_json::from_str(&contents).expect("valid json");
    assert_eq!(parsed["report_version"], 1);
}

#[test]
fn quiet_suppresses_ok_message() {
    let temp = TempDir::new().expect("tempdir");
    let input = write_log(&temp, "capture.bin", &clean_log());
    let report = temp.path().join("report.json");

    let assert = cmd()
        .arg("log")
        .arg("decode")
        .arg(input)
        .arg("-o")
        .arg(report)
        .arg("--quiet")
        .assert()
        .success();
    let stderr = String::from_utf8(assert.get_output().stderr.clone()).expect("utf8 stderr");
    assert!(!stderr.contains("OK: report written"));
}

#[test]
fn strict_fails_on_discarded_frames() {
    let temp = TempDir::new().expect("tempdir");
    let input = write_log(&temp, "capture.bin", &faulty_log());

    cmd()
        .arg("log")
        .arg("decode")
        .arg(input)
        .arg("--stdout")
        .arg("--strict")
        .assert()
        .failure()
        .stderr(contains("discarded frames detected"));
}

#[test]
fn strict_passes_on_clean_log() {
    let temp = TempDir::new().expect("tempdir");
    let input = write_log(&temp, "capture.bin", &clean_log());

    cmd()
        .arg("log")
        .arg("decode")
        .arg(input)
        .arg("--stdout")
        .arg("--strict")
        .assert()
        .success();
}

#[test]
fn verify_checksum_drops_corrupt_frames() {
    let temp = TempDir::new().expect("tempdir");
    let input = write_log(&temp, "capture.bin", &faulty_log());

    let assert = cmd()
        .arg("log")
        .arg("decode")
        .arg(&input)
        .arg("--stdout")
        .assert()
        .success();
    let lenient: Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("valid json");
    // Lenient mode accepts the frame whose checksum byte is wrong.
    assert_eq!(lenient["summary"]["samples_total"], 4);

    let assert = cmd()
        .arg("log")
        .arg("decode")
        .arg(&input)
        .arg("--stdout")
        .arg("--verify-checksum")
        .assert()
        .success();
    let strict: Value = serde_json::from_slice(&assert.get_output().stdout).expect("valid json");
    assert_eq!(strict["summary"]["samples_total"], 3);
    assert_eq!(strict["integrity"]["checksum_mismatch"], 1);
}

#[test]
fn list_faults_prints_counters() {
    let temp = TempDir::new().expect("tempdir");
    let input = write_log(&temp, "capture.bin", &faulty_log());

    cmd()
        .arg("log")
        .arg("decode")
        .arg(input)
        .arg("--stdout")
        .arg("--list-faults")
        .assert()
        .success()
        .stderr(contains("Frame integrity").and(contains("bad end marker")));
}

#[test]
fn pretty_and_compact_conflict() {
    let temp = TempDir::new().expect("tempdir");
    let input = write_log(&temp, "capture.bin", &clean_log());
    let report = temp.path().join("report.json");

    cmd()
        .arg("log")
        .arg("decode")
        .arg(input)
        .arg("-o")
        .arg(report)
        .arg("--pretty")
        .arg("--compact")
        .assert()
        .failure()
        .stderr(contains("error:"));
}

#[test]
fn report_path_must_differ_from_input() {
    let temp = TempDir::new().expect("tempdir");
    let input = write_log(&temp, "capture.bin", &clean_log());

    cmd()
        .arg("log")
        .arg("decode")
        .arg(&input)
        .arg("-o")
        .arg(&input)
        .assert()
        .failure()
        .stderr(contains("report path must differ from input"));
}

#[test]
fn retain_bounds_the_sample_window() {
    let temp = TempDir::new().expect("tempdir");
    let input = write_log(&temp, "capture.bin", &clean_log());

    let assert = cmd()
        .arg("log")
        .arg("decode")
        .arg(input)
        .arg("--stdout")
        .arg("--retain")
        .arg("1")
        .assert()
        .success();
    let report: Value = serde_json::from_slice(&assert.get_output().stdout).expect("valid json");
    assert_eq!(report["summary"]["samples_total"], 3);
    assert_eq!(report["samples"].as_array().map(Vec::len), Some(1));
    assert_eq!(report["samples"][0]["seq"], 2);
}
