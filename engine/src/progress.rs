//! Progress tracking and reporting.
//!
//! The copy loop is the only writer of [`TransferProgress`]. A reporter thread
//! started by [`ProgressTracker::run_while`] polls it on a fixed cadence, turns
//! each reading into a [`ProgressSnapshot`] with throughput-based ETAs, and hands
//! the snapshot to a [`ProgressCallback`]. The copy loop never waits on the
//! reporter and the reporter never waits on I/O.

use crossbeam_channel::{bounded, select, tick};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use crate::model::{RunState, TransferOutcome};

/// How often the reporter samples the counters.
pub const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Minimum time on the current file before a per-file ETA is shown.
pub const FILE_ETA_MIN_ELAPSED: Duration = Duration::from_millis(500);

/// Minimum run time before an overall ETA is shown.
pub const RUN_ETA_MIN_ELAPSED: Duration = Duration::from_secs(1);

/// Trait for receiving progress from a transfer run.
///
/// Keeps the engine independent of any UI technology. `on_snapshot` is called
/// from the reporter thread; the other methods from the thread driving the job.
pub trait ProgressCallback: Send + Sync {
    /// Called whenever the job moves to a new state.
    fn on_state_changed(&self, _state: RunState) {}

    /// Called on every reporter tick while files are being copied.
    fn on_snapshot(&self, snapshot: &ProgressSnapshot);

    /// Called once when the run reaches its outcome.
    fn on_finished(&self, _outcome: &TransferOutcome) {}
}

/// Live counters for one run.
///
/// Bytes are kept as one cumulative counter for the run plus the value it had
/// when the current file began. A reading loads the cumulative counter once, so
/// `completed_bytes + file_bytes` never goes backwards between readings.
#[derive(Debug, Default)]
pub struct TransferProgress {
    current_file_index: AtomicUsize,
    total_files: AtomicUsize,
    current_file_size: AtomicU64,
    /// Bytes written so far in this run
    done_bytes: AtomicU64,
    /// `done_bytes` when the current file began
    file_base: AtomicU64,
    total_bytes: AtomicU64,
    current_file_name: Mutex<String>,
    file_started: Mutex<Option<Instant>>,
    run_started: Mutex<Option<Instant>>,
}

impl TransferProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all counters for a run of `total_files` files and `total_bytes` bytes.
    pub fn begin_run(&self, total_files: usize, total_bytes: u64) {
        self.current_file_index.store(0, Ordering::Release);
        self.total_files.store(total_files, Ordering::Release);
        self.current_file_size.store(0, Ordering::Release);
        self.done_bytes.store(0, Ordering::Release);
        self.file_base.store(0, Ordering::Release);
        self.total_bytes.store(total_bytes, Ordering::Release);
        set(&self.current_file_name, String::new());
        set(&self.file_started, None);
        set(&self.run_started, Some(Instant::now()));
    }

    /// Mark the start of file `index` (zero-based).
    pub fn begin_file(&self, index: usize, name: &str, size: u64) {
        self.file_base
            .store(self.done_bytes.load(Ordering::Acquire), Ordering::Release);
        self.current_file_index.store(index, Ordering::Release);
        self.current_file_size.store(size, Ordering::Release);
        set(&self.current_file_name, name.to_string());
        set(&self.file_started, Some(Instant::now()));
    }

    /// Record `bytes` more written for the current file.
    pub fn add_file_bytes(&self, bytes: u64) {
        self.done_bytes.fetch_add(bytes, Ordering::AcqRel);
    }

    /// Close the current file; everything written so far counts as completed.
    pub fn finish_file(&self) {
        self.file_base
            .store(self.done_bytes.load(Ordering::Acquire), Ordering::Release);
    }

    pub fn current_file_bytes(&self) -> u64 {
        let done = self.done_bytes.load(Ordering::Acquire);
        done.saturating_sub(self.file_base.load(Ordering::Acquire))
    }

    /// Bytes written so far in this run, finished files and the current one.
    pub fn completed_bytes(&self) -> u64 {
        self.done_bytes.load(Ordering::Acquire)
    }

    /// Time since `begin_run`, if a run has started.
    pub fn run_elapsed(&self) -> Option<Duration> {
        get(&self.run_started).map(|t| t.elapsed())
    }

    /// Take a copy of the counters.
    pub fn reading(&self) -> ProgressReading {
        let done = self.done_bytes.load(Ordering::Acquire);
        // Read after `done`: a newer base only means the file just rolled over.
        let base = self.file_base.load(Ordering::Acquire).min(done);
        ProgressReading {
            file_index: self.current_file_index.load(Ordering::Acquire),
            total_files: self.total_files.load(Ordering::Acquire),
            file_name: get(&self.current_file_name),
            file_bytes: done - base,
            file_size: self.current_file_size.load(Ordering::Acquire),
            completed_bytes: base,
            total_bytes: self.total_bytes.load(Ordering::Acquire),
            file_elapsed: get(&self.file_started).map(|t| t.elapsed()),
            run_elapsed: self.run_elapsed(),
        }
    }
}

// A poisoned lock still holds a usable value; progress is advisory.
fn set<T>(slot: &Mutex<T>, value: T) {
    match slot.lock() {
        Ok(mut guard) => *guard = value,
        Err(poisoned) => *poisoned.into_inner() = value,
    }
}

fn get<T: Clone>(slot: &Mutex<T>) -> T {
    match slot.lock() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Raw counter values at one instant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressReading {
    pub file_index: usize,
    pub total_files: usize,
    pub file_name: String,
    pub file_bytes: u64,
    pub file_size: u64,
    pub completed_bytes: u64,
    pub total_bytes: u64,
    pub file_elapsed: Option<Duration>,
    pub run_elapsed: Option<Duration>,
}

/// Human-readable progress derived from one reading.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    /// Overall completion, 0 to 100
    pub percent: f64,
    /// e.g. `clip.mp4: 12.00 MB of 50.00 MB`
    pub file_status: String,
    /// Remaining time for the current file, once measurable
    pub file_eta: Option<String>,
    /// Remaining time for the whole run, once measurable
    pub overall_eta: Option<String>,
    /// e.g. `2 of 5 files`
    pub files_counter: String,
    pub bytes_done: u64,
    pub bytes_total: u64,
}

impl ProgressSnapshot {
    pub fn from_reading(reading: &ProgressReading) -> Self {
        let bytes_done = reading.completed_bytes + reading.file_bytes;
        let percent = if reading.total_bytes > 0 {
            (bytes_done as f64 / reading.total_bytes as f64 * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };

        let file_eta = reading
            .file_elapsed
            .filter(|elapsed| *elapsed >= FILE_ETA_MIN_ELAPSED)
            .and_then(|elapsed| {
                remaining(
                    reading.file_bytes,
                    reading.file_size.saturating_sub(reading.file_bytes),
                    elapsed,
                )
            })
            .map(format_duration);

        let overall_eta = reading
            .run_elapsed
            .filter(|elapsed| *elapsed >= RUN_ETA_MIN_ELAPSED)
            .and_then(|elapsed| {
                remaining(
                    bytes_done,
                    reading.total_bytes.saturating_sub(bytes_done),
                    elapsed,
                )
            })
            .map(format_duration);

        let file_number = if reading.total_files == 0 {
            0
        } else {
            (reading.file_index + 1).min(reading.total_files)
        };

        ProgressSnapshot {
            percent,
            file_status: format!(
                "{}: {} of {}",
                reading.file_name,
                format_bytes(reading.file_bytes),
                format_bytes(reading.file_size)
            ),
            file_eta,
            overall_eta,
            files_counter: format!("{} of {} files", file_number, reading.total_files),
            bytes_done,
            bytes_total: reading.total_bytes,
        }
    }
}

/// Time to move `left` more bytes at the rate `done` bytes took over `elapsed`.
fn remaining(done: u64, left: u64, elapsed: Duration) -> Option<Duration> {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return None;
    }
    let throughput = done as f64 / secs;
    if throughput <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(left as f64 / throughput).ok()
}

/// Format a byte count with binary units, e.g. `1.50 MB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_idx])
}

/// Format a duration as `XhYmZs`, dropping leading zero units.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{}h{}m{}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m{}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Background reporter polling a [`TransferProgress`].
pub struct ProgressTracker;

impl ProgressTracker {
    /// Run `work` on the calling thread while a reporter thread emits a snapshot
    /// every `interval`.
    ///
    /// The reporter is stopped and joined before this returns, whether `work`
    /// succeeds, fails or panics.
    pub fn run_while<R>(
        progress: &TransferProgress,
        callback: &dyn ProgressCallback,
        interval: Duration,
        work: impl FnOnce() -> R,
    ) -> R {
        thread::scope(|scope| {
            let (stop_tx, stop_rx) = bounded::<()>(0);
            scope.spawn(move || {
                let ticker = tick(interval);
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            let snapshot = ProgressSnapshot::from_reading(&progress.reading());
                            callback.on_snapshot(&snapshot);
                        }
                        // Sender dropped: the work is over.
                        recv(stop_rx) -> _ => break,
                    }
                }
            });

            let result = work();
            drop(stop_tx);
            result
        })
    }
}
