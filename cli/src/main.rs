//! Offload - Command-line interface for the media offload engine.
//!
//! Takes the candidate volumes on the command line (first is the card, second
//! the backup), loads optional settings, and reports progress to stderr.

use chrono::Local;
use clap::Parser;
use offload_engine::{
    execute_transfer,
    progress::{format_bytes, ProgressCallback, ProgressSnapshot},
    LogSink, NullLog, RunState, SelectionMode, TransferOutcome, TransferSettings, Volume,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Offload - copy the latest shooting session to a backup volume
#[derive(Parser, Debug)]
#[command(name = "offload")]
#[command(version = "0.1.0")]
#[command(about = "Copy the newest media from a card to a backup volume, skipping what is already there")]
struct Args {
    /// Candidate volumes as LABEL=PATH or PATH; the first is the source, the second the destination
    #[arg(value_name = "VOLUME", value_parser = parse_volume)]
    volumes: Vec<Volume>,

    /// Settings file (JSON); missing or unreadable files fall back to defaults
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Selection mode: window or count
    #[arg(long, value_name = "MODE")]
    mode: Option<String>,

    /// Time window in minutes for window mode
    #[arg(long, value_name = "MINUTES")]
    window_minutes: Option<String>,

    /// Number of newest files for count mode
    #[arg(long, value_name = "COUNT")]
    max_files: Option<String>,

    /// Do not copy videos
    #[arg(long)]
    no_videos: bool,

    /// Do not copy photos
    #[arg(long)]
    no_photos: bool,

    /// Comma-separated video extensions
    #[arg(long, value_name = "LIST")]
    video_ext: Option<String>,

    /// Comma-separated photo extensions
    #[arg(long, value_name = "LIST")]
    photo_ext: Option<String>,

    /// Write the effective settings back to the settings file
    #[arg(long, requires = "config")]
    save_settings: bool,

    /// Enable verbose output
    #[arg(long)]
    verbose: bool,

    /// Do not print the run log; progress and the summary are still shown
    #[arg(long, conflicts_with = "verbose")]
    quiet: bool,
}

/// Parse `LABEL=PATH`, or a bare `PATH` labelled by its last component.
fn parse_volume(arg: &str) -> Result<Volume, String> {
    let (label, path) = match arg.split_once('=') {
        Some((label, path)) => {
            if label.trim().is_empty() {
                return Err(format!("Empty volume label in '{}'", arg));
            }
            (label.trim().to_string(), PathBuf::from(path))
        }
        None => {
            let path = PathBuf::from(arg);
            let label = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| arg.to_string());
            (label, path)
        }
    };
    if path.as_os_str().is_empty() {
        return Err(format!("Empty volume path in '{}'", arg));
    }
    Ok(Volume::new(path, label))
}

/// Run log lines go straight to stderr.
struct StderrLog;

impl LogSink for StderrLog {
    fn append(&self, line: &str) {
        // Clear a half-drawn progress line first.
        eprintln!("\r\x1b[2K{}", line);
    }
}

/// CLI implementation of ProgressCallback for displaying transfer progress
struct CliProgress {
    verbose: bool,
}

impl CliProgress {
    fn new(verbose: bool) -> Self {
        CliProgress { verbose }
    }

    fn print_progress_bar(percent: f64) -> String {
        let percent = percent.clamp(0.0, 100.0) as usize;
        let filled = percent / 5;
        let empty = 20 - filled;
        format!("[{}{}] {:3}%", "=".repeat(filled), " ".repeat(empty), percent)
    }

    /// One status line: overall bar, file counter, current file and ETAs.
    fn render_snapshot(snapshot: &ProgressSnapshot) -> String {
        let mut line = format!(
            "{} {} | {}/{} | {}",
            Self::print_progress_bar(snapshot.percent),
            snapshot.files_counter,
            format_bytes(snapshot.bytes_done),
            format_bytes(snapshot.bytes_total),
            snapshot.file_status
        );
        if let Some(eta) = &snapshot.file_eta {
            line.push_str(&format!(" ({} left)", eta));
        }
        if let Some(eta) = &snapshot.overall_eta {
            line.push_str(&format!(" | {} left overall", eta));
        }
        line
    }
}

impl ProgressCallback for CliProgress {
    fn on_state_changed(&self, state: RunState) {
        if self.verbose {
            eprintln!("\r\x1b[2K-- {}", state);
        }
    }

    fn on_snapshot(&self, snapshot: &ProgressSnapshot) {
        eprint!("\r\x1b[2K{}", Self::render_snapshot(snapshot));
        let _ = std::io::stderr().flush();
    }

    fn on_finished(&self, outcome: &TransferOutcome) {
        eprintln!();
        match outcome {
            TransferOutcome::Completed(summary) => {
                eprintln!("Transfer complete!");
                eprintln!("{}", summary);
            }
            TransferOutcome::NoWork(reason) => eprintln!("Nothing to transfer: {}", reason),
            TransferOutcome::Failed(message) => eprintln!("Transfer failed: {}", message),
        }
    }
}

/// Parse command-line arguments, then run the transfer
fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let exit_code = match run_cli(&args) {
        Ok(outcome) => exit_code_for(&outcome),
        Err(msg) => {
            eprintln!("Error: {}", msg);
            2
        }
    };

    std::process::exit(exit_code);
}

fn exit_code_for(outcome: &TransferOutcome) -> i32 {
    if outcome.is_failure() {
        1
    } else {
        0
    }
}

/// Main CLI logic - separated for testability
fn run_cli(args: &Args) -> Result<TransferOutcome, String> {
    let mut settings = match &args.config {
        Some(path) => TransferSettings::load(path),
        None => TransferSettings::default(),
    };
    apply_overrides(&mut settings, args)?;

    eprintln!("Offload started at {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    let progress = CliProgress::new(args.verbose);
    let sink: &dyn LogSink = if args.quiet { &NullLog } else { &StderrLog };
    let outcome = execute_transfer(&args.volumes, &mut settings, sink, Some(&progress));

    if args.save_settings {
        if let Some(path) = &args.config {
            save_settings(&settings, path)?;
        }
    }

    Ok(outcome)
}

/// Apply command-line flags on top of the loaded settings.
fn apply_overrides(settings: &mut TransferSettings, args: &Args) -> Result<(), String> {
    if let Some(mode) = &args.mode {
        settings.selection_mode = match mode.to_lowercase().as_str() {
            "window" | "time-window" => SelectionMode::TimeWindow,
            "count" | "fixed-count" => SelectionMode::FixedCount,
            _ => {
                return Err(format!(
                    "Invalid mode '{}'. Must be 'window' or 'count'",
                    mode
                ))
            }
        };
    }
    if let Some(minutes) = &args.window_minutes {
        settings.time_window_minutes = minutes.clone();
    }
    if let Some(count) = &args.max_files {
        settings.max_files = count.clone();
    }
    if args.no_videos {
        settings.copy_videos = false;
    }
    if args.no_photos {
        settings.copy_photos = false;
    }
    if let Some(list) = &args.video_ext {
        settings.video_extensions = list.clone();
    }
    if let Some(list) = &args.photo_ext {
        settings.photo_extensions = list.clone();
    }
    Ok(())
}

fn save_settings(settings: &TransferSettings, path: &Path) -> Result<(), String> {
    settings
        .save(path)
        .map_err(|e| format!("Could not save settings to {}: {}", path.display(), e))
}
