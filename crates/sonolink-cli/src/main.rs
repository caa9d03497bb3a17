use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use glob::glob;

use sonolink_core::{
    CaptureOptions, ChecksumMode, Report, SampleStream, SerialConfig, SerialPortSource,
    StreamEvent, capture_report, replay_log_file,
};

const BUILD_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("SONOLINK_BUILD_COMMIT"),
    " ",
    env!("SONOLINK_BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "sonolink")]
#[command(version = BUILD_VERSION)]
#[command(
    about = "Decoder and capture tool for SonoLink serial telemetry (ultrasonic ranger + photo sensor).",
    long_about = None,
    after_help = "Examples:\n  sonolink log decode telemetry.bin -o report.json\n  sonolink log replay telemetry.bin --stdout --pretty\n  sonolink serial capture --port /dev/ttyUSB0 --count 100 -o report.json\n  sonolink serial watch --port /dev/ttyUSB0"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Operations on raw byte logs (offline-first).
    Log {
        #[command(subcommand)]
        command: LogCommands,
    },
    /// Operations on a live serial link.
    Serial {
        #[command(subcommand)]
        command: SerialCommands,
    },
}

#[derive(Subcommand, Debug)]
enum LogCommands {
    /// Decode a raw byte log and generate a versioned JSON report.
    #[command(alias = "replay")]
    #[command(
        after_help = "Examples:\n  sonolink log decode telemetry.bin -o report.json\n  sonolink log replay 'captures/*.bin' --stdout"
    )]
    Decode {
        /// Path to a raw byte log (.bin, .raw, .log or .dat)
        input: PathBuf,

        /// Stop after N decoded samples (whole log otherwise)
        #[arg(long)]
        count: Option<u64>,

        #[command(flatten)]
        decode: DecodeArgs,

        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Subcommand, Debug)]
enum SerialCommands {
    /// Capture samples from a serial port and generate a JSON report.
    Capture {
        /// Serial device path (e.g. /dev/ttyUSB0)
        #[arg(long)]
        port: String,

        /// Baud rate of the link
        #[arg(long, default_value_t = 9600)]
        baud: u32,

        /// Number of samples to capture
        #[arg(long)]
        count: u64,

        #[command(flatten)]
        decode: DecodeArgs,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Stream decoded samples to stdout as JSON lines.
    Watch {
        /// Serial device path (e.g. /dev/ttyUSB0)
        #[arg(long)]
        port: String,

        /// Baud rate of the link
        #[arg(long, default_value_t = 9600)]
        baud: u32,

        /// Stop after this many samples (runs until the link fails otherwise)
        #[arg(long)]
        count: Option<u64>,

        /// Validate the XOR checksum byte and drop mismatching frames
        #[arg(long)]
        verify_checksum: bool,

        /// Suppress dropped-frame notices on stderr
        #[arg(long)]
        quiet: bool,
    },
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Validate the XOR checksum byte and discard mismatching frames
    #[arg(long)]
    verify_checksum: bool,

    /// Keep at most N recent samples in the report
    #[arg(long, default_value_t = sonolink_core::DEFAULT_RETAIN)]
    retain: usize,
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Output report path (JSON)
    #[arg(short = 'o', long, required_unless_present = "stdout")]
    report: Option<PathBuf>,

    /// Write JSON report to stdout
    #[arg(long, conflicts_with = "report")]
    stdout: bool,

    /// Pretty-print JSON output
    #[arg(long, conflicts_with = "compact")]
    pretty: bool,

    /// Compact JSON output (default)
    #[arg(long)]
    compact: bool,

    /// Suppress non-error output
    #[arg(long)]
    quiet: bool,

    /// Exit with a non-zero code if any frame was discarded
    #[arg(long)]
    strict: bool,

    /// List frame-integrity counters after decoding
    #[arg(long)]
    list_faults: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Log { command } => match command {
            LogCommands::Decode {
                input,
                count,
                decode,
                output,
            } => cmd_log_decode(input, count, decode, output),
        },
        Commands::Serial { command } => match command {
            SerialCommands::Capture {
                port,
                baud,
                count,
                decode,
                output,
            } => cmd_serial_capture(port, baud, count, decode, output),
            SerialCommands::Watch {
                port,
                baud,
                count,
                verify_checksum,
                quiet,
            } => cmd_serial_watch(port, baud, count, verify_checksum, quiet),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {}", hint);
            }
            ExitCode::from(2)
        }
    }
}

#[derive(Debug)]
struct CliError {
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            message: message.into(),
            hint,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::new(err.to_string(), None)
    }
}

fn checksum_mode(verify: bool) -> ChecksumMode {
    if verify {
        ChecksumMode::Xor
    } else {
        ChecksumMode::Ignore
    }
}

fn cmd_log_decode(
    input: PathBuf,
    count: Option<u64>,
    decode: DecodeArgs,
    output: OutputArgs,
) -> Result<(), CliError> {
    let resolved_input = resolve_input_path(&input)?;
    validate_input_file(&resolved_input)?;
    let input_abs = fs::canonicalize(&resolved_input)
        .with_context(|| format!("Failed to resolve input path: {}", resolved_input.display()))?;

    if let Some(report_path) = output.report.as_ref() {
        ensure_report_differs_from_input(report_path, &input_abs)?;
    }

    let meta = fs::metadata(&resolved_input)
        .with_context(|| format!("Failed to read input file: {}", resolved_input.display()))?;
    if !meta.is_file() {
        return Err(CliError::new(
            format!("input is not a file: {}", input.display()),
            Some("use a raw byte log file".to_string()),
        ));
    }

    let options = CaptureOptions {
        checksum_mode: checksum_mode(decode.verify_checksum),
        max_samples: count,
        retain: decode.retain,
        stamp_samples: false,
    };
    let report = replay_log_file(&resolved_input, &options)
        .with_context(|| format!("Failed to decode log: {}", resolved_input.display()))?;

    write_report(&report, &output)
}

fn cmd_serial_capture(
    port: String,
    baud: u32,
    count: u64,
    decode: DecodeArgs,
    output: OutputArgs,
) -> Result<(), CliError> {
    let config = SerialConfig::new(port.as_str()).with_baud_rate(baud);
    let source = SerialPortSource::open(&config).map_err(|err| {
        CliError::new(
            format!("could not open serial port {}: {}", port, err),
            Some("check the device path and permissions".to_string()),
        )
    })?;

    let options = CaptureOptions {
        checksum_mode: checksum_mode(decode.verify_checksum),
        max_samples: Some(count),
        retain: decode.retain,
        stamp_samples: true,
    };
    let report = capture_report(&port, source, &options)
        .with_context(|| format!("Serial capture failed on {}", port))?;

    write_report(&report, &output)
}

fn cmd_serial_watch(
    port: String,
    baud: u32,
    count: Option<u64>,
    verify_checksum: bool,
    quiet: bool,
) -> Result<(), CliError> {
    let config = SerialConfig::new(port.as_str()).with_baud_rate(baud);
    let source = SerialPortSource::open(&config).map_err(|err| {
        CliError::new(
            format!("could not open serial port {}: {}", port, err),
            Some("check the device path and permissions".to_string()),
        )
    })?;
    let cancel = source.cancel_token();
    let stream = SampleStream::spawn(source, checksum_mode(verify_checksum));

    let mut seen = 0u64;
    loop {
        match stream.recv() {
            Some(StreamEvent::Sample(sample)) => {
                let line = serde_json::json!({
                    "seq": seen,
                    "distance_cm": sample.distance_cm,
                    "light_level": sample.light_level,
                });
                println!("{}", line);
                seen += 1;
                if count.is_some_and(|limit| seen >= limit) {
                    cancel.cancel();
                }
            }
            Some(StreamEvent::Discarded(fault)) => {
                if !quiet {
                    eprintln!("dropped frame: {}", fault);
                }
            }
            Some(StreamEvent::Finished(counters)) => {
                if !quiet {
                    eprintln!(
                        "stream ended: {} samples decoded, {} frames dropped",
                        counters.frames_decoded, counters.frames_discarded
                    );
                }
                break;
            }
            Some(StreamEvent::Failed(err)) => {
                // A cancel that lands mid-frame truncates the read; that is
                // an ordinary stop, not a link failure.
                if cancel.is_cancelled() {
                    break;
                }
                return Err(CliError::new(format!("serial link failed: {}", err), None));
            }
            None => break,
        }
    }
    stream.join();
    Ok(())
}

fn write_report(report: &Report, output: &OutputArgs) -> Result<(), CliError> {
    let json = serialize_report(report, output.pretty, output.compact)?;

    if output.stdout {
        print!("{}", json);
        if output.list_faults && !output.quiet {
            print_faults(report);
        }
        if output.strict && has_faults(report) {
            return Err(CliError::new(
                "discarded frames detected",
                Some("use --list-faults to inspect".to_string()),
            ));
        }
        return Ok(());
    }

    let path = output
        .report
        .as_ref()
        .expect("report required when not using stdout");
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create output directory: {}", parent.display())
            })?;
        }
    }

    fs::write(path, json)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;

    if output.list_faults && !output.quiet {
        print_faults(report);
    }
    if !output.quiet {
        eprintln!("OK: report written -> {}", path.display());
    }
    if output.strict && has_faults(report) {
        return Err(CliError::new(
            "discarded frames detected",
            Some("use --list-faults to inspect".to_string()),
        ));
    }
    Ok(())
}

fn serialize_report(report: &Report, pretty: bool, compact: bool) -> Result<String, CliError> {
    if pretty && compact {
        return Err(CliError::new(
            "cannot use --pretty and --compact together",
            Some("choose one output format".to_string()),
        ));
    }
    if pretty {
        serde_json::to_string_pretty(report)
            .context("JSON serialization failed")
            .map_err(Into::into)
    } else {
        serde_json::to_string(report)
            .context("JSON serialization failed")
            .map_err(Into::into)
    }
}

fn has_faults(report: &Report) -> bool {
    report.integrity.frames_discarded > 0
}

fn print_faults(report: &Report) {
    let integrity = &report.integrity;
    eprintln!("Frame integrity (checksum mode: {}):", integrity.checksum_mode);
    eprintln!("  frames decoded    {}", integrity.frames_decoded);
    eprintln!("  frames discarded  {}", integrity.frames_discarded);
    eprintln!("  bad end marker    {}", integrity.bad_end_marker);
    eprintln!("  checksum mismatch {}", integrity.checksum_mismatch);
    eprintln!("  bytes skipped     {}", integrity.bytes_skipped);
}

fn ensure_report_differs_from_input(
    report_path: &PathBuf,
    input_abs: &PathBuf,
) -> Result<(), CliError> {
    let report_abs = report_path
        .parent()
        .map(|parent| {
            if parent.as_os_str().is_empty() {
                fs::canonicalize(".")
            } else {
                fs::canonicalize(parent)
            }
        })
        .transpose()
        .with_context(|| format!("Failed to resolve output path: {}", report_path.display()))?;
    if let Some(report_dir) = report_abs {
        let report_target = report_dir.join(
            report_path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("Invalid report path"))?,
        );
        if &report_target == input_abs {
            return Err(CliError::new(
                format!(
                    "report path must differ from input: {}",
                    report_path.display()
                ),
                Some("choose a different output path".to_string()),
            ));
        }
    }
    Ok(())
}

fn validate_input_file(input: &PathBuf) -> Result<(), CliError> {
    if !input.exists() {
        return Err(CliError::new(
            format!("input file not found: {}", input.display()),
            Some("use a raw byte log (.bin, .raw, .log or .dat)".to_string()),
        ));
    }
    let ext = input
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    if !matches!(ext.as_str(), "bin" | "raw" | "log" | "dat") {
        return Err(CliError::new(
            format!("unsupported input format '{}'", input.display()),
            Some("expected a raw byte log (.bin, .raw, .log or .dat)".to_string()),
        ));
    }
    Ok(())
}

fn resolve_input_path(input: &PathBuf) -> Result<PathBuf, CliError> {
    let pattern = input.to_string_lossy();
    if !is_glob_pattern(&pattern) {
        return Ok(input.clone());
    }

    let mut matches = Vec::new();
    let paths = glob(&pattern).map_err(|err| {
        CliError::new(
            format!("invalid input pattern '{}'", pattern),
            Some(format!("pattern error: {}", err.msg)),
        )
    })?;
    for entry in paths {
        let path = entry.map_err(|err| {
            CliError::new(
                format!("invalid input pattern '{}'", pattern),
                Some(format!("pattern error: {}", err)),
            )
        })?;
        if path.is_file() {
            matches.push(path);
        }
    }

    if matches.is_empty() {
        return Err(CliError::new(
            format!("no files match pattern '{}'", pattern),
            Some("check the path or quote the pattern; expected a raw byte log".to_string()),
        ));
    }
    if matches.len() > 1 {
        let hint = "pass a single log file, or run once per file".to_string();
        let mut message = format!(
            "multiple files match pattern '{}' ({} matches)",
            pattern,
            matches.len()
        );
        let listed = matches.iter().take(3).collect::<Vec<_>>();
        if !listed.is_empty() {
            let mut details = String::new();
            details.push_str("; matches: ");
            details.push_str(
                &listed
                    .into_iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            );
            if matches.len() > 3 {
                details.push_str(", ...");
            }
            message.push_str(&details);
        }
        return Err(CliError::new(message, Some(hint)));
    }

    Ok(matches.remove(0))
}

fn is_glob_pattern(input: &str) -> bool {
    input.contains('*') || input.contains('?') || input.contains('[')
}
